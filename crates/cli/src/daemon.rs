//! Detaching from the invoking session
//!
//! # Fork safety
//!
//! [`daemonize`] MUST run before any async runtime or other thread exists.
//! `fork()` copies only the calling thread, so forking a multi-threaded
//! process leaves the child with locks nobody will ever release. `main`
//! therefore daemonizes first and builds the Tokio runtime afterwards.

use crate::lock::{LockError, LockFile};
use crate::logging;
use nix::errno::Errno;
use nix::sys::stat::{umask, Mode};
use nix::unistd::{chdir, close, dup2, fork, getpid, setsid, sysconf, ForkResult, Pid, SysconfVar};
use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::{IntoRawFd, RawFd};
use thiserror::Error;
use tracing::Level;

/// Descriptor bound used when the platform reports no limit
const FALLBACK_OPEN_MAX: RawFd = 1024;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to change directory to /: {0}")]
    Chdir(#[source] Errno),

    #[error("initial fork failed: {0}")]
    Fork(#[source] Errno),

    #[error("failed to become session leader: {0}")]
    Setsid(#[source] Errno),

    #[error("failed to record daemon pid: {0}")]
    OwnerId(#[source] LockError),

    #[error("failed to redirect standard streams to /dev/null: {0}")]
    Stdio(#[source] io::Error),

    #[error("failed to install syslog subscriber: {0}")]
    Logging(#[source] tracing::subscriber::SetGlobalDefaultError),
}

/// Move the process into the background
///
/// The parent exits with status 0 inside this call; only the child returns.
/// On error nothing has been torn down, so the caller still owns `lock` and
/// must release it.
pub fn daemonize(lock: &mut LockFile, level: Level) -> Result<Pid, DaemonError> {
    // Avoid pinning whatever directory we were started from
    chdir("/").map_err(DaemonError::Chdir)?;

    // SAFETY: called from main before the Tokio runtime or any other thread
    // is created, so the process is single-threaded here.
    match unsafe { fork() }.map_err(DaemonError::Fork)? {
        ForkResult::Parent { .. } => {
            // Parent exits immediately without running destructors, so the
            // lock file stays in place for the child
            std::process::exit(0);
        }
        ForkResult::Child => {}
    }

    // New session - become session and group leader, lose controlling terminal
    setsid().map_err(DaemonError::Setsid)?;

    let pid = getpid();
    lock.write_owner_id(pid).map_err(DaemonError::OwnerId)?;

    let keep: Vec<RawFd> = lock.raw_fd().into_iter().collect();
    close_descriptors((0..descriptor_limit()).rev(), &keep);

    umask(Mode::empty());
    redirect_stdio_to_null().map_err(DaemonError::Stdio)?;

    logging::init_syslog(level).map_err(DaemonError::Logging)?;

    Ok(pid)
}

/// Upper bound on descriptor numbers as reported by `sysconf(_SC_OPEN_MAX)`
pub fn descriptor_limit() -> RawFd {
    match sysconf(SysconfVar::OPEN_MAX) {
        Ok(Some(limit)) if limit > 0 => RawFd::try_from(limit).unwrap_or(RawFd::MAX),
        _ => FALLBACK_OPEN_MAX,
    }
}

/// Close every descriptor in `fds` except those in `keep`
///
/// Returns how many descriptors were actually open and got closed.
pub fn close_descriptors<I>(fds: I, keep: &[RawFd]) -> usize
where
    I: IntoIterator<Item = RawFd>,
{
    fds.into_iter()
        .filter(|fd| !keep.contains(fd))
        .filter(|fd| close(*fd).is_ok())
        .count()
}

/// Point stdin, stdout and stderr at /dev/null
fn redirect_stdio_to_null() -> io::Result<()> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")?
        .into_raw_fd();

    for target in 0..=2 {
        if null != target {
            dup2(null, target).map_err(io::Error::from)?;
        }
    }

    if null > 2 {
        close(null).map_err(io::Error::from)?;
    }
    Ok(())
}
