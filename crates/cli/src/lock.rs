//! Lock file management for daemon exclusivity
//!
//! The lock file is created with `O_EXCL`, held under an exclusive `flock`,
//! and contains the owning daemon's pid followed by a newline. A leftover
//! file is never removed automatically: a live owner means another daemon
//! is running, a dead owner needs an operator to clean up.

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicPtr, Ordering};
use thiserror::Error;

/// Path and descriptor the fatal signal handler releases
///
/// Stored as raw words so the handler can take them without allocating.
static EMERGENCY_PATH: AtomicPtr<libc::c_char> = AtomicPtr::new(ptr::null_mut());
static EMERGENCY_FD: AtomicI32 = AtomicI32::new(-1);

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "a lock file {} has been detected; it appears to be owned by the (active) process with PID {}",
        path.display(),
        pid
    )]
    AlreadyRunning { path: PathBuf, pid: i32 },

    #[error(
        "a lock file {} has been detected; its owner {} is defunct. Delete the lock file and try again",
        path.display(),
        describe_owner(*pid)
    )]
    StaleLock { path: PathBuf, pid: Option<i32> },

    #[error("could not acquire exclusive lock on {}: {}", path.display(), source)]
    Contended {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("can't get lock file {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn describe_owner(pid: Option<i32>) -> String {
    match pid {
        Some(pid) => format!("PID {}", pid),
        None => "(unreadable PID)".to_string(),
    }
}

/// Exclusive daemon lock
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: Option<File>,
    armed: bool,
}

impl LockFile {
    /// Acquire the singleton lock at `path`
    ///
    /// Returns error if:
    /// - The file exists and its owner is alive (`AlreadyRunning`)
    /// - The file exists and its owner is gone or unreadable (`StaleLock`)
    /// - The file was created but another process holds the `flock`
    /// - Any other I/O failure
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o644)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(classify_existing(path));
            }
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        // From here on, dropping `lock` removes the file we created
        let mut lock = Self {
            path: path.to_path_buf(),
            file: Some(file),
            armed: false,
        };

        if let Some(file) = lock.file.as_ref() {
            try_flock_exclusive(file).map_err(|source| LockError::Contended {
                path: path.to_path_buf(),
                source,
            })?;
        }

        lock.write_owner_id(Pid::this())?;
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Descriptor of the held lock file, if still held
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Replace the recorded owner with `pid`
    pub fn write_owner_id(&mut self, pid: Pid) -> Result<(), LockError> {
        let path = self.path.clone();
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        let file = self.file.as_mut().ok_or_else(|| {
            io_err(io::Error::new(io::ErrorKind::NotFound, "lock already released"))
        })?;
        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        file.write_all(format!("{}\n", pid).as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    }

    /// Let the fatal signal handler release this lock
    ///
    /// Only the daemon process arms its lock; the record stays until
    /// [`LockFile::release`] runs.
    pub fn arm_emergency_release(&mut self) {
        let (Some(fd), Ok(path)) = (
            self.raw_fd(),
            CString::new(self.path.as_os_str().as_bytes()),
        ) else {
            return;
        };

        EMERGENCY_FD.store(fd, Ordering::SeqCst);
        let previous = EMERGENCY_PATH.swap(path.into_raw(), Ordering::SeqCst);
        if !previous.is_null() {
            // SAFETY: produced by an earlier arm and no longer published
            drop(unsafe { CString::from_raw(previous) });
        }
        self.armed = true;
    }

    /// Close the descriptor and delete the lock file
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn release(&mut self) {
        if self.armed {
            disarm_emergency_release();
            self.armed = false;
        }

        if self.file.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("failed to remove lock file {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        self.release();
    }
}

/// Release the armed lock from signal context
///
/// Only async-signal-safe calls: two atomic swaps, `close`, `unlink`.
pub fn emergency_release() {
    let fd = EMERGENCY_FD.swap(-1, Ordering::SeqCst);
    if fd >= 0 {
        // SAFETY: fd was the lock descriptor; the process exits right after
        unsafe { libc::close(fd) };
    }

    let path = EMERGENCY_PATH.swap(ptr::null_mut(), Ordering::SeqCst);
    if !path.is_null() {
        // SAFETY: path is a NUL-terminated string leaked by arm_emergency_release
        unsafe { libc::unlink(path) };
    }
}

fn disarm_emergency_release() {
    EMERGENCY_FD.store(-1, Ordering::SeqCst);
    let path = EMERGENCY_PATH.swap(ptr::null_mut(), Ordering::SeqCst);
    if !path.is_null() {
        // SAFETY: produced by CString::into_raw and no longer published
        drop(unsafe { CString::from_raw(path) });
    }
}

/// Work out why an existing lock file blocks us
fn classify_existing(path: &Path) -> LockError {
    let pid = match read_owner_pid(path) {
        Ok(pid) => pid,
        Err(source) => {
            return LockError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    let Some(pid) = pid else {
        return LockError::StaleLock {
            path: path.to_path_buf(),
            pid: None,
        };
    };

    match probe_process(pid) {
        Ok(true) => LockError::AlreadyRunning {
            path: path.to_path_buf(),
            pid,
        },
        Ok(false) => LockError::StaleLock {
            path: path.to_path_buf(),
            pid: Some(pid),
        },
        Err(errno) => LockError::Io {
            path: path.to_path_buf(),
            source: io::Error::from(errno),
        },
    }
}

/// Read the pid stored in a lock file
///
/// `Ok(None)` means the file exists but does not hold a usable pid.
pub fn read_owner_pid(path: &Path) -> io::Result<Option<i32>> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    Ok(parse_pid(&contents))
}

fn parse_pid(contents: &str) -> Option<i32> {
    contents.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}

/// Probe a pid with the null signal
///
/// `EPERM` means the process exists but belongs to someone else.
fn probe_process(pid: i32) -> Result<bool, Errno> {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => Ok(true),
        Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Try to acquire exclusive file lock (non-blocking)
fn try_flock_exclusive(file: &File) -> Result<(), Errno> {
    use nix::fcntl::{flock, FlockArg};

    flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock)
}
