//! Device channels over kernel-exposed attribute files
//!
//! Attribute files always report the latest value from offset 0, so a
//! channel is rewound after every poll instead of being read as a stream.

use crate::config::DaemonConfig;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest value read from any attribute in one poll
const READ_LIMIT: usize = 16;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O on {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Access mode for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// An open attribute file
#[derive(Debug)]
pub struct DeviceChannel {
    path: PathBuf,
    file: File,
}

impl DeviceChannel {
    /// Open the attribute at `path`
    pub fn open(path: &Path, access: Access) -> Result<Self, ChannelError> {
        let file = OpenOptions::new()
            .read(true)
            .write(access == Access::ReadWrite)
            .open(path)
            .map_err(|source| ChannelError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the attribute text from the current position
    pub fn read_text(&mut self) -> Result<String, ChannelError> {
        let mut buf = [0u8; READ_LIMIT];
        let len = self.file.read(&mut buf).map_err(|e| self.io_error(e))?;
        Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
    }

    /// Read the attribute as a decimal integer
    pub fn read_value(&mut self) -> Result<i64, ChannelError> {
        let text = self.read_text()?;
        Ok(parse_leading_int(&text))
    }

    /// Overwrite the attribute from offset 0 with `value`
    pub fn write_value(&mut self, value: i64) -> Result<(), ChannelError> {
        self.rewind()?;
        self.file
            .write_all(format!("{}\n", value).as_bytes())
            .map_err(|e| self.io_error(e))
    }

    /// Reset the read position to the start of the attribute
    pub fn rewind(&mut self) -> Result<(), ChannelError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: io::Error) -> ChannelError {
        ChannelError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// The three channels the poll loop works with
///
/// A channel that failed to open stays `None` for the whole run.
#[derive(Debug, Default)]
pub struct DeviceChannels {
    pub light: Option<DeviceChannel>,
    pub backlight: Option<DeviceChannel>,
    pub jack: Option<DeviceChannel>,
}

impl DeviceChannels {
    /// Open every channel once, logging each one that is unavailable
    pub fn open(config: &DaemonConfig) -> Self {
        let channels = Self {
            light: open_or_warn(&config.light_sensor_path, Access::ReadOnly),
            backlight: open_or_warn(&config.backlight_path, Access::ReadWrite),
            jack: open_or_warn(&config.audio_jack_path, Access::ReadOnly),
        };

        tracing::info!(
            light = channels.light.is_some(),
            backlight = channels.backlight.is_some(),
            jack = channels.jack.is_some(),
            "device channels opened"
        );

        channels
    }

    /// Rewind every open channel
    pub fn rewind_all(&mut self) {
        for channel in [&mut self.light, &mut self.backlight, &mut self.jack]
            .into_iter()
            .flatten()
        {
            if let Err(e) = channel.rewind() {
                tracing::debug!("{}", e);
            }
        }
    }

    /// Close every channel
    pub fn close(&mut self) {
        self.light = None;
        self.backlight = None;
        self.jack = None;
    }
}

fn open_or_warn(path: &Path, access: Access) -> Option<DeviceChannel> {
    match DeviceChannel::open(path, access) {
        Ok(channel) => Some(channel),
        Err(e) => {
            tracing::warn!("{}; subsystem disabled for this run", e);
            None
        }
    }
}

/// Parse a leading decimal integer the way `atoi` does
///
/// Leading whitespace and one sign are accepted, parsing stops at the first
/// non-digit, and text without digits yields 0.
pub fn parse_leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });

    if negative {
        -value
    } else {
        value
    }
}
