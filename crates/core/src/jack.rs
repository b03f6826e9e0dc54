//! Headphone jack debouncing

use crate::audio::{AudioRouter, MixerControl};

/// Status text the switch driver reports when nothing is plugged in
pub const UNPLUGGED_SENTINEL: &str = "No Device";

/// A jack transition that was acted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JackEvent {
    /// A device was plugged in; carries the reported device name
    Plugged(String),
    Unplugged,
}

/// Tracks the last observed jack state and routes audio on real changes
#[derive(Debug, Default)]
pub struct JackMonitor {
    plugged: bool,
}

impl JackMonitor {
    /// Starts out unplugged, so a device present at startup routes once
    pub fn new() -> Self {
        Self { plugged: false }
    }

    pub fn is_plugged(&self) -> bool {
        self.plugged
    }

    /// Feed one status reading
    ///
    /// Returns the transition if the reading changed the state, after asking
    /// `router` to switch outputs. Repeated identical readings do nothing.
    pub fn observe<R: AudioRouter + ?Sized>(
        &mut self,
        status: &str,
        router: &mut R,
    ) -> Option<JackEvent> {
        let status = status.trim_end_matches(|c: char| c == '\n' || c == '\r');
        let plugged = status != UNPLUGGED_SENTINEL;
        if plugged == self.plugged {
            return None;
        }
        self.plugged = plugged;

        let event = if plugged {
            tracing::info!("audio {} plugged", status);
            route(router, MixerControl::Speaker, MixerControl::Headphone);
            JackEvent::Plugged(status.to_string())
        } else {
            tracing::info!("audio headset unplugged");
            route(router, MixerControl::Headphone, MixerControl::Speaker);
            JackEvent::Unplugged
        };
        Some(event)
    }
}

fn route<R: AudioRouter + ?Sized>(router: &mut R, mute: MixerControl, unmute: MixerControl) {
    if let Err(e) = router.mute(mute) {
        tracing::warn!("failed to mute {}: {}", mute.name(), e);
    }
    if let Err(e) = router.unmute(unmute) {
        tracing::warn!("failed to unmute {}: {}", unmute.name(), e);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;

    /// Router double that records every call
    #[derive(Debug, Default)]
    pub(crate) struct RecordingRouter {
        pub calls: Vec<(&'static str, MixerControl)>,
    }

    impl AudioRouter for RecordingRouter {
        fn mute(&mut self, control: MixerControl) -> io::Result<()> {
            self.calls.push(("mute", control));
            Ok(())
        }

        fn unmute(&mut self, control: MixerControl) -> io::Result<()> {
            self.calls.push(("unmute", control));
            Ok(())
        }
    }

    #[test]
    fn test_initial_unplugged_reading_is_silent() {
        let mut monitor = JackMonitor::new();
        let mut router = RecordingRouter::default();
        assert_eq!(monitor.observe("No Device\n", &mut router), None);
        assert!(router.calls.is_empty());
    }

    #[test]
    fn test_plug_then_unplug() {
        let mut monitor = JackMonitor::new();
        let mut router = RecordingRouter::default();

        let event = monitor.observe("h2w\n", &mut router);
        assert_eq!(event, Some(JackEvent::Plugged("h2w".to_string())));
        assert!(monitor.is_plugged());
        assert_eq!(
            router.calls,
            vec![
                ("mute", MixerControl::Speaker),
                ("unmute", MixerControl::Headphone)
            ]
        );

        router.calls.clear();
        assert_eq!(
            monitor.observe("No Device", &mut router),
            Some(JackEvent::Unplugged)
        );
        assert_eq!(
            router.calls,
            vec![
                ("mute", MixerControl::Headphone),
                ("unmute", MixerControl::Speaker)
            ]
        );
    }

    #[test]
    fn test_repeated_readings_debounced() {
        let mut monitor = JackMonitor::new();
        let mut router = RecordingRouter::default();

        for _ in 0..5 {
            monitor.observe("Headset", &mut router);
        }
        assert_eq!(router.calls.len(), 2);

        for _ in 0..5 {
            monitor.observe("No Device", &mut router);
        }
        assert_eq!(router.calls.len(), 4);
    }

    #[test]
    fn test_sentinel_match_is_exact() {
        let mut monitor = JackMonitor::new();
        let mut router = RecordingRouter::default();
        // Anything other than the exact sentinel counts as plugged
        assert!(monitor.observe("no device", &mut router).is_some());
        assert!(monitor.is_plugged());
    }

    #[test]
    fn test_router_failure_keeps_new_state() {
        struct FailingRouter;
        impl AudioRouter for FailingRouter {
            fn mute(&mut self, _: MixerControl) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::NotFound, "amixer"))
            }
            fn unmute(&mut self, _: MixerControl) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::NotFound, "amixer"))
            }
        }

        let mut monitor = JackMonitor::new();
        assert!(monitor.observe("Headset", &mut FailingRouter).is_some());
        assert!(monitor.observe("Headset", &mut FailingRouter).is_none());
    }
}
