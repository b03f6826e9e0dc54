//! Process-wide control flags
//!
//! The signal layer writes these flags and the poll loop reads them once per
//! cycle. Every field is a lone atomic word and no operation spans two
//! fields, so no lock is ever needed.

use std::sync::atomic::{AtomicBool, Ordering};

/// What the poll loop should do at the top of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDecision {
    /// Run the cycle
    Continue,
    /// A reload was requested; flags were cleared and the cycle runs
    Reloaded,
    /// Graceful shutdown requested; leave the loop
    Exit,
}

/// Shutdown, reload and auto-brightness flags
#[derive(Debug)]
pub struct ControlState {
    shutdown_requested: AtomicBool,
    reload_requested: AtomicBool,
    auto_brightness: AtomicBool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    /// Fresh state: running, no reload pending, auto-brightness on
    pub const fn new() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            reload_requested: AtomicBool::new(false),
            auto_brightness: AtomicBool::new(true),
        }
    }

    /// Graceful stop: the loop exits at its next cycle boundary
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Reload: the loop clears both flags and keeps running
    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::SeqCst);
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Flip auto-brightness, returning the new setting
    pub fn toggle_auto_brightness(&self) -> bool {
        !self.auto_brightness.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn auto_brightness(&self) -> bool {
        self.auto_brightness.load(Ordering::SeqCst)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn reload_requested(&self) -> bool {
        self.reload_requested.load(Ordering::SeqCst)
    }

    /// Sample the flags at the top of a cycle
    ///
    /// Shutdown alone exits. Shutdown together with reload clears both and
    /// continues; reload does not re-read anything yet.
    pub fn begin_cycle(&self) -> LoopDecision {
        if !self.shutdown_requested() {
            return LoopDecision::Continue;
        }

        if self.reload_requested() {
            self.reload_requested.store(false, Ordering::SeqCst);
            self.shutdown_requested.store(false, Ordering::SeqCst);
            LoopDecision::Reloaded
        } else {
            LoopDecision::Exit
        }
    }
}
