//! Fixed daemon configuration
//!
//! There is no configuration file. Every path and tuning constant lives here
//! with defaults matching the target hardware; tests build their own
//! `DaemonConfig` pointing at temporary files.

use std::path::PathBuf;
use std::time::Duration;

/// Lock file holding the running daemon's pid
pub const LOCK_FILE_PATH: &str = "/var/run/prime-sensors.pid";

/// Ambient light sensor (lux, decimal text)
pub const LIGHT_SENSOR_PATH: &str = "/sys/devices/platform/tegra-i2c.2/i2c-2/2-001c/show_lux";

/// Backlight brightness control (decimal text, read-write)
pub const BACKLIGHT_PATH: &str = "/sys/class/backlight/pwm-backlight/brightness";

/// Headphone jack switch name ("No Device" when unplugged)
pub const AUDIO_JACK_PATH: &str = "/sys/class/switch/h2w/name";

/// Identifier attached to every syslog line
pub const LOG_IDENT: &str = "prime-sensors";

/// Environment variable overriding the log verbosity ceiling
pub const LOG_LEVEL_ENV: &str = "PRIME_SENSORS_LOG";

/// Brightness tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessConfig {
    /// Lowest brightness the daemon will ever set (default: 4)
    pub floor: u32,
    /// Highest brightness the daemon will ever set (default: 255)
    pub ceiling: u32,
    /// Ambient lux per brightness step (default: 1.5)
    pub lux_divisor: f64,
    /// Minimum difference before the backlight is rewritten (default: 15)
    pub dead_band: u32,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            floor: 4,
            ceiling: 255,
            lux_divisor: 1.5,
            dead_band: 15,
        }
    }
}

/// Complete daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub lock_path: PathBuf,
    pub light_sensor_path: PathBuf,
    pub backlight_path: PathBuf,
    pub audio_jack_path: PathBuf,
    /// Poll cycle period (default: 1s)
    pub poll_interval: Duration,
    pub brightness: BrightnessConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            lock_path: PathBuf::from(LOCK_FILE_PATH),
            light_sensor_path: PathBuf::from(LIGHT_SENSOR_PATH),
            backlight_path: PathBuf::from(BACKLIGHT_PATH),
            audio_jack_path: PathBuf::from(AUDIO_JACK_PATH),
            poll_interval: Duration::from_secs(1),
            brightness: BrightnessConfig::default(),
        }
    }
}
