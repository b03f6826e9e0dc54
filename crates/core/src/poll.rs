//! One iteration of the sensor poll loop
//!
//! Timing and shutdown checks belong to the caller; a [`Poller`] only reads
//! the channels, adjusts the backlight, and tracks the headphone jack.

use crate::audio::AudioRouter;
use crate::brightness;
use crate::channel::{ChannelError, DeviceChannels};
use crate::config::BrightnessConfig;
use crate::control::ControlState;
use crate::jack::{JackEvent, JackMonitor};

/// What a single cycle did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Brightness written to the backlight, if any
    pub brightness_written: Option<u32>,
    /// Jack transition handled this cycle, if any
    pub jack_event: Option<JackEvent>,
}

/// Per-run poll state: brightness tuning, jack debounce, audio router
pub struct Poller<R: AudioRouter> {
    brightness: BrightnessConfig,
    jack: JackMonitor,
    router: R,
}

impl<R: AudioRouter> Poller<R> {
    pub fn new(brightness: BrightnessConfig, router: R) -> Self {
        Self {
            brightness,
            jack: JackMonitor::new(),
            router,
        }
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    /// Run one cycle against `channels`
    ///
    /// Read errors are logged and skip only the affected subsystem. Every
    /// open channel is rewound before returning.
    pub fn run_cycle(&mut self, state: &ControlState, channels: &mut DeviceChannels) -> CycleReport {
        let mut report = CycleReport::default();

        if state.auto_brightness() {
            match self.adjust_brightness(channels) {
                Ok(written) => report.brightness_written = written,
                Err(e) => tracing::debug!("brightness poll skipped: {}", e),
            }
        }

        if let Some(jack) = channels.jack.as_mut() {
            match jack.read_text() {
                Ok(status) => report.jack_event = self.jack.observe(&status, &mut self.router),
                Err(e) => tracing::debug!("jack poll skipped: {}", e),
            }
        }

        channels.rewind_all();
        report
    }

    fn adjust_brightness(&self, channels: &mut DeviceChannels) -> Result<Option<u32>, ChannelError> {
        let (Some(light), Some(backlight)) = (channels.light.as_mut(), channels.backlight.as_mut())
        else {
            return Ok(None);
        };

        let lux = light.read_value()?;
        let current = backlight.read_value()?;

        match brightness::plan_update(lux, current, &self.brightness) {
            Some(target) => {
                backlight.write_value(i64::from(target))?;
                tracing::debug!(lux, current, target, "backlight adjusted");
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }
}
