pub mod buffer;
pub(crate) mod commands;
mod controller;
pub mod gate;
mod loop_worker;
pub mod simulator;
pub mod window;

pub use buffer::{Ingested, LiveBuffer, ManualSave, PendingWrite};
pub use controller::LiveController;
pub use gate::PersistenceGate;
pub use window::LiveWindow;
