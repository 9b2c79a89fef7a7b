mod history;
mod live_feed;
mod markers;

pub use live_feed::{LiveSubscription, LIVE_FEED_PATH};
pub use markers::LAST_SAVED_MARKER;
