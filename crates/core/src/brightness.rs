//! Ambient light to backlight mapping with a dead-band

use crate::config::BrightnessConfig;

/// Target brightness for an ambient light reading
///
/// `floor + lux / divisor`, truncated toward zero and clamped to the ceiling.
/// Negative readings are treated as darkness.
pub fn target_brightness(lux: i64, config: &BrightnessConfig) -> u32 {
    let lux = lux.max(0) as f64;
    let target = f64::from(config.floor) + lux / config.lux_divisor;
    if target >= f64::from(config.ceiling) {
        config.ceiling
    } else {
        target as u32
    }
}

/// Whether the backlight should be rewritten
///
/// Only differences strictly greater than the dead-band count, so sensor
/// noise around the current level never causes a write.
pub fn needs_update(current: i64, target: u32, config: &BrightnessConfig) -> bool {
    (current - i64::from(target)).unsigned_abs() > u64::from(config.dead_band)
}

/// Brightness to write for this cycle, if any
///
/// A current reading of zero or below means the display is off; it is left
/// alone so polling never wakes it.
pub fn plan_update(lux: i64, current: i64, config: &BrightnessConfig) -> Option<u32> {
    if current <= 0 {
        return None;
    }

    let target = target_brightness(lux, config);
    needs_update(current, target, config).then_some(target)
}
