//! Signal handling for the sensor daemon
//!
//! Signals fall into three groups:
//! - Ignored: nothing this daemon does involves pipes, timers, job control or
//!   waiting on children
//! - Fatal: fault conditions. A raw handler logs a fixed message, releases
//!   the lock file and `_exit`s; it never allocates or formats
//! - Control: delivered through Tokio's self-pipe, so all real work runs
//!   in normal task context. The dispatcher only flips [`ControlState`]
//!   flags or forwards an immediate stop to the poll loop

use nix::libc::{self, c_int};
use nix::sys::signal::{self as nix_signal, SaFlags, SigAction, SigHandler, SigSet, Signal};
use sensors_core::ControlState;
use std::io;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lock;

/// Signals with no meaning for this daemon
pub const IGNORED_SIGNALS: &[Signal] = &[
    Signal::SIGPIPE,
    Signal::SIGALRM,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    Signal::SIGURG,
    Signal::SIGXCPU,
    Signal::SIGXFSZ,
    Signal::SIGVTALRM,
    Signal::SIGPROF,
    Signal::SIGIO,
    Signal::SIGCHLD,
];

/// Signals that log, release the lock and terminate
///
/// SIGCONT is included: job control never applies to a detached daemon.
pub fn fatal_signals() -> Vec<Signal> {
    let mut signals = vec![
        Signal::SIGQUIT,
        Signal::SIGILL,
        Signal::SIGTRAP,
        Signal::SIGABRT,
        Signal::SIGBUS,
        Signal::SIGFPE,
        Signal::SIGSEGV,
        Signal::SIGCONT,
        Signal::SIGSYS,
    ];
    #[cfg(any(target_os = "linux", target_os = "android"))]
    signals.extend([Signal::SIGSTKFLT, Signal::SIGPWR]);
    signals
}

/// A control signal as seen by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// SIGTERM: leave the loop now
    ImmediateStop,
    /// SIGUSR1: finish the current cycle, then exit
    GracefulStop,
    /// SIGHUP: restart point; currently re-reads nothing
    Reload,
    /// SIGUSR2: flip auto-brightness
    Toggle,
}

impl ControlSignal {
    /// Apply a flag-only signal to `state`
    ///
    /// Returns `false` for [`ControlSignal::ImmediateStop`], which has no flag
    /// and must be forwarded to the poll loop instead.
    pub fn apply(self, state: &ControlState) -> bool {
        match self {
            ControlSignal::ImmediateStop => return false,
            ControlSignal::GracefulStop => {
                tracing::info!("caught SIGUSR1 - soft shutdown");
                state.request_shutdown();
            }
            ControlSignal::Reload => {
                tracing::info!("caught SIGHUP");
                state.request_reload();
            }
            ControlSignal::Toggle => {
                let enabled = state.toggle_auto_brightness();
                tracing::info!("caught SIGUSR2 - auto brightness {}", if enabled { "on" } else { "off" });
            }
        }
        true
    }
}

/// Tokio streams for the four control signals
pub struct ControlSignals {
    terminate: tokio::signal::unix::Signal,
    graceful: tokio::signal::unix::Signal,
    reload: tokio::signal::unix::Signal,
    toggle: tokio::signal::unix::Signal,
}

impl ControlSignals {
    /// Register the control signals; must run inside a Tokio runtime
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            graceful: signal(SignalKind::user_defined1())?,
            reload: signal(SignalKind::hangup())?,
            toggle: signal(SignalKind::user_defined2())?,
        })
    }

    /// Wait for the next control signal
    pub async fn recv(&mut self) -> ControlSignal {
        tokio::select! {
            Some(()) = self.terminate.recv() => ControlSignal::ImmediateStop,
            Some(()) = self.graceful.recv() => ControlSignal::GracefulStop,
            Some(()) = self.reload.recv() => ControlSignal::Reload,
            Some(()) = self.toggle.recv() => ControlSignal::Toggle,
            else => std::future::pending().await,
        }
    }
}

/// Run the dispatcher task
///
/// Flag signals are applied to `state` directly. The returned receiver
/// yields once per immediate-stop request.
pub fn spawn_dispatcher(
    mut signals: ControlSignals,
    state: Arc<ControlState>,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        loop {
            let received = signals.recv().await;
            if !received.apply(&state) {
                tracing::info!("caught SIGTERM - stopping immediately");
                if tx.send(()).is_err() {
                    return;
                }
            }
        }
    });
    (handle, rx)
}

/// Set every signal in [`IGNORED_SIGNALS`] to `SIG_IGN`
pub fn ignore_irrelevant() -> nix::Result<()> {
    for sig in IGNORED_SIGNALS {
        // SAFETY: SIG_IGN installs no Rust code
        unsafe { nix_signal::signal(*sig, SigHandler::SigIgn) }?;
    }
    Ok(())
}

/// Route every fatal signal to [`fatal_handler`]
pub fn install_fatal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(fatal_handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in fatal_signals() {
        // SAFETY: fatal_handler only calls async-signal-safe functions
        unsafe { nix_signal::sigaction(sig, &action) }?;
    }
    Ok(())
}

extern "C" fn fatal_handler(signum: c_int) {
    let message = fatal_message(signum);
    // SAFETY: static NUL-terminated strings, fixed format; _exit never returns
    unsafe {
        libc::syslog(libc::LOG_INFO, b"%s\0".as_ptr().cast(), message.as_ptr());
        libc::closelog();
    }
    lock::emergency_release();
    unsafe { libc::_exit(0) };
}

/// Pre-rendered log line for a fatal signal
fn fatal_message(signum: c_int) -> &'static [u8] {
    match signum {
        libc::SIGQUIT => b"caught signal: SIGQUIT - exiting\0",
        libc::SIGILL => b"caught signal: SIGILL - exiting\0",
        libc::SIGTRAP => b"caught signal: SIGTRAP - exiting\0",
        libc::SIGABRT => b"caught signal: SIGABRT - exiting\0",
        libc::SIGBUS => b"caught signal: SIGBUS - exiting\0",
        libc::SIGFPE => b"caught signal: SIGFPE - exiting\0",
        libc::SIGSEGV => b"caught signal: SIGSEGV - exiting\0",
        libc::SIGCONT => b"caught signal: SIGCONT - exiting\0",
        libc::SIGSYS => b"caught signal: SIGSYS - exiting\0",
        #[cfg(any(target_os = "linux", target_os = "android"))]
        libc::SIGSTKFLT => b"caught signal: SIGSTKFLT - exiting\0",
        #[cfg(any(target_os = "linux", target_os = "android"))]
        libc::SIGPWR => b"caught signal: SIGPWR - exiting\0",
        _ => b"caught fatal signal - exiting\0",
    }
}
