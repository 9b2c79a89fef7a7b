pub(crate) mod commands;
pub mod import;
mod loader;
mod sample;

pub use import::{import_file, parse_table};
pub use loader::{load_history, try_load_history};
pub use sample::sample_records;
