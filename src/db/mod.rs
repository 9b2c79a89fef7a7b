mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::StoredItem;
pub use repositories::{LiveSubscription, LAST_SAVED_MARKER, LIVE_FEED_PATH};
