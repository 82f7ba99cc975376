pub mod command;
pub mod deps;
pub mod session;

pub use command::{MirrorCommand, MirrorOptions};
pub use deps::{DependencyChecker, DependencyReport, MirrorVersion, Scrcpy, ToolCapabilities};
pub use session::{SessionExit, SessionInfo, SessionSupervisor};
