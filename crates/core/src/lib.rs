//! Sensor logic for the prime-sensors daemon
//!
//! This crate holds everything that does not depend on the process being a
//! daemon:
//! - Fixed configuration (device paths, brightness tuning)
//! - Control flags shared with the signal layer
//! - Device channels over sysfs attribute files
//! - Brightness mapping with a dead-band
//! - Headphone jack debouncing and audio routing

pub mod audio;
pub mod brightness;
pub mod channel;
pub mod config;
pub mod control;
pub mod jack;
pub mod poll;

pub use audio::{AmixerRouter, AudioRouter, MixerControl};
pub use channel::{Access, ChannelError, DeviceChannel, DeviceChannels};
pub use config::{BrightnessConfig, DaemonConfig};
pub use control::{ControlState, LoopDecision};
pub use jack::{JackEvent, JackMonitor};
pub use poll::{CycleReport, Poller};
