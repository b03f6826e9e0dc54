//! Audio routing collaborator
//!
//! The daemon never talks to the sound card directly; it asks the mixer
//! command to mute one output and unmute the other.

use std::io;
use std::process::{Command, Stdio};

/// Mixer control names on the target hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerControl {
    Speaker,
    Headphone,
}

impl MixerControl {
    pub fn name(self) -> &'static str {
        match self {
            MixerControl::Speaker => "Int Spk",
            MixerControl::Headphone => "Headphone Jack",
        }
    }
}

/// Something that can mute and unmute mixer controls
pub trait AudioRouter {
    fn mute(&mut self, control: MixerControl) -> io::Result<()>;
    fn unmute(&mut self, control: MixerControl) -> io::Result<()>;
}

/// Routes audio by spawning `amixer set <control> mute|unmute`
///
/// Children are not waited on. The daemon ignores SIGCHLD, so the kernel
/// reaps them.
#[derive(Debug, Clone)]
pub struct AmixerRouter {
    program: String,
}

impl Default for AmixerRouter {
    fn default() -> Self {
        Self {
            program: "amixer".to_string(),
        }
    }
}

impl AmixerRouter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn set(&self, control: MixerControl, state: &str) -> io::Result<()> {
        tracing::debug!(control = control.name(), state, "amixer set");
        Command::new(&self.program)
            .args(["set", control.name(), state])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

impl AudioRouter for AmixerRouter {
    fn mute(&mut self, control: MixerControl) -> io::Result<()> {
        self.set(control, "mute")
    }

    fn unmute(&mut self, control: MixerControl) -> io::Result<()> {
        self.set(control, "unmute")
    }
}
