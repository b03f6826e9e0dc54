//! Logging setup
//!
//! Before detaching, diagnostics go to stderr. Once the daemon is detached,
//! every `tracing` event is rendered by the fmt layer and handed to syslog
//! (facility LOCAL0, identifier `prime-sensors`).

use nix::libc::{self, c_int};
use sensors_core::config::LOG_LEVEL_ENV;
use std::ffi::CString;
use std::io::{self, Write};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// syslog keeps the identifier pointer, so it must live forever
const SYSLOG_IDENT: &[u8] = b"prime-sensors\0";

/// Verbosity ceiling from the environment, defaulting to debug
pub fn level_from_env() -> Level {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(Level::DEBUG)
}

/// Scoped stderr logging for the foreground part of startup
pub fn stderr_default(level: Level) -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Open syslog and route all `tracing` output to it
pub fn init_syslog(level: Level) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    // SAFETY: the identifier is a static NUL-terminated string
    unsafe {
        libc::openlog(
            SYSLOG_IDENT.as_ptr().cast(),
            libc::LOG_PID | libc::LOG_CONS | libc::LOG_NDELAY | libc::LOG_NOWAIT,
            libc::LOG_LOCAL0,
        );
        libc::setlogmask(log_upto(syslog_priority(level)));
    }

    let subscriber = tracing_subscriber::fmt()
        .with_writer(SyslogMakeWriter)
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_level(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

/// Close the syslog connection
pub fn close_syslog() {
    // SAFETY: closelog has no preconditions
    unsafe { libc::closelog() };
}

/// syslog priority for a tracing level
pub fn syslog_priority(level: Level) -> c_int {
    match level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
    }
}

/// Equivalent of the `LOG_UPTO` macro
pub fn log_upto(priority: c_int) -> c_int {
    (1 << (priority + 1)) - 1
}

/// Hands out one [`SyslogWriter`] per event
#[derive(Debug, Clone, Copy, Default)]
pub struct SyslogMakeWriter;

impl<'a> MakeWriter<'a> for SyslogMakeWriter {
    type Writer = SyslogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogWriter::new(libc::LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogWriter::new(syslog_priority(*meta.level()))
    }
}

/// Buffers one rendered event and sends it to syslog when dropped
#[derive(Debug)]
pub struct SyslogWriter {
    priority: c_int,
    buf: Vec<u8>,
}

impl SyslogWriter {
    fn new(priority: c_int) -> Self {
        Self {
            priority,
            buf: Vec::with_capacity(128),
        }
    }

    /// The message syslog will receive, without the trailing newline
    fn message(&self) -> Option<CString> {
        let mut line: Vec<u8> = self
            .buf
            .iter()
            .copied()
            .filter(|b| *b != 0)
            .collect();
        while line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.is_empty() {
            return None;
        }
        CString::new(line).ok()
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogWriter {
    fn drop(&mut self) {
        if let Some(message) = self.message() {
            // SAFETY: fixed "%s" format with one NUL-terminated argument
            unsafe {
                libc::syslog(self.priority, b"%s\0".as_ptr().cast(), message.as_ptr());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensors_core::config::LOG_IDENT;

    #[test]
    fn test_ident_matches_config() {
        assert_eq!(&SYSLOG_IDENT[..SYSLOG_IDENT.len() - 1], LOG_IDENT.as_bytes());
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(syslog_priority(Level::ERROR), libc::LOG_ERR);
        assert_eq!(syslog_priority(Level::WARN), libc::LOG_WARNING);
        assert_eq!(syslog_priority(Level::INFO), libc::LOG_INFO);
        assert_eq!(syslog_priority(Level::TRACE), libc::LOG_DEBUG);
    }

    #[test]
    fn test_log_upto_mask() {
        // LOG_DEBUG is 7: every priority bit 0..=7 set
        assert_eq!(log_upto(libc::LOG_DEBUG), 0xff);
        assert_eq!(log_upto(libc::LOG_INFO), 0x7f);
        assert_eq!(log_upto(libc::LOG_EMERG), 0x01);
    }

    #[test]
    fn test_writer_message_strips_newline_and_nul() {
        let mut writer = SyslogWriter::new(libc::LOG_INFO);
        writer.write_all(b"audio Headset\0 plugged\n").unwrap();
        assert_eq!(
            writer.message().unwrap().to_str().unwrap(),
            "audio Headset plugged"
        );
        // Dropping without output must not emit anything
        writer.buf.clear();
        assert!(writer.message().is_none());
    }
}
