//! prime-sensors - ambient light and headphone jack daemon

use anyhow::Result;
use clap::{CommandFactory, Parser};
use prime_sensors::{control, run_daemon, ControlCommand, ControlError};
use sensors_core::DaemonConfig;

/// Keeps the backlight matched to ambient light and routes audio on jack changes
///
/// Without a command, starts the daemon. With a command, signals the running
/// daemon and exits.
#[derive(Parser)]
#[command(name = "prime-sensors")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<ControlCommand>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DaemonConfig::default();

    match cli.command {
        Some(command) => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();

            match control::send(&config.lock_path, command) {
                Ok(pid) => {
                    tracing::info!("sent {} to daemon {}", command.signal(), pid);
                    Ok(())
                }
                Err(e @ ControlError::LockUnreadable { .. }) => {
                    eprintln!("{}", Cli::command().render_usage());
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
        None => run_daemon(config),
    }
}
