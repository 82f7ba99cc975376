pub mod bridge;
pub mod connection;
pub mod controller;
pub mod error;
pub mod events;
pub mod mirror;
pub mod process;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common items
pub use connection::{Connection, ConnectionMode};
pub use controller::{Controller, ControllerHandle};
pub use error::{MirrorError, Result};
pub use events::{ConsoleEventListener, EventEmitter, MirrorEvent};
pub use utils::config::Config;
