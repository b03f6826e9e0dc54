//! Control client: signal the running daemon

use crate::lock::read_owner_pid;
use clap::Subcommand;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Commands understood by a running daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum ControlCommand {
    /// Finish the current cycle and shut down
    Stop,
    /// Restart the poll loop without exiting
    Restart,
    /// Toggle automatic brightness on or off
    Sensorstate,
}

impl ControlCommand {
    /// Signal carrying this command
    pub fn signal(self) -> Signal {
        match self {
            ControlCommand::Stop => Signal::SIGUSR1,
            ControlCommand::Restart => Signal::SIGHUP,
            ControlCommand::Sensorstate => Signal::SIGUSR2,
        }
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(
        "lock file {} not found ({}); maybe the service is not running?",
        path.display(),
        source
    )]
    LockUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("lock file {} does not contain a valid pid", path.display())]
    InvalidPid { path: PathBuf },

    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal {
        pid: i32,
        signal: Signal,
        #[source]
        source: Errno,
    },
}

/// Pid recorded in the daemon's lock file
pub fn daemon_pid(lock_path: &Path) -> Result<Pid, ControlError> {
    let pid = read_owner_pid(lock_path).map_err(|source| ControlError::LockUnreadable {
        path: lock_path.to_path_buf(),
        source,
    })?;

    pid.map(Pid::from_raw).ok_or_else(|| ControlError::InvalidPid {
        path: lock_path.to_path_buf(),
    })
}

/// Send `command` to the daemon recorded in `lock_path`
pub fn send(lock_path: &Path, command: ControlCommand) -> Result<Pid, ControlError> {
    let pid = daemon_pid(lock_path)?;
    let signal = command.signal();

    kill(pid, signal).map_err(|source| ControlError::Signal {
        pid: pid.as_raw(),
        signal,
        source,
    })?;

    tracing::debug!(pid = pid.as_raw(), %signal, "sent control signal");
    Ok(pid)
}
