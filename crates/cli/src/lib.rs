//! prime-sensors daemon library
//!
//! Process-level pieces of the sensor daemon: the singleton lock file,
//! session detachment, signal handling, the syslog sink, the poll loop
//! runner, and the control client that signals a running instance.

pub mod control;
pub mod daemon;
pub mod lock;
pub mod logging;
pub mod runner;
pub mod signals;

pub use control::{ControlCommand, ControlError};
pub use lock::{LockError, LockFile};
pub use runner::{run_daemon, LoopExit, LoopSummary};
