//! Daemon lifecycle: lock, detach, signals, poll loop, teardown

use crate::daemon;
use crate::lock::LockFile;
use crate::logging;
use crate::signals::{self, ControlSignals};
use anyhow::{Context, Result};
use sensors_core::{
    AmixerRouter, AudioRouter, ControlState, DaemonConfig, DeviceChannels, LoopDecision, Poller,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// How the poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown flag observed at a cycle boundary
    Graceful,
    /// Immediate stop; the loop was abandoned between cycles
    Terminated,
}

/// Poll loop outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub exit: LoopExit,
    pub cycles: u64,
    pub reloads: u64,
}

/// Run the sensor poll loop until a stop is requested
///
/// Each tick first samples `state`; the only wait is for the next tick or
/// an immediate-stop request on `terminate`.
pub async fn poll_loop<R: AudioRouter>(
    state: &ControlState,
    channels: &mut DeviceChannels,
    poller: &mut Poller<R>,
    period: Duration,
    terminate: &mut mpsc::UnboundedReceiver<()>,
) -> LoopSummary {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles = 0;
    let mut reloads = 0;

    loop {
        tokio::select! {
            biased;

            Some(()) = terminate.recv() => {
                return LoopSummary { exit: LoopExit::Terminated, cycles, reloads };
            }
            _ = interval.tick() => {
                match state.begin_cycle() {
                    LoopDecision::Exit => {
                        return LoopSummary { exit: LoopExit::Graceful, cycles, reloads };
                    }
                    LoopDecision::Reloaded => {
                        // Nothing to re-read yet; carry on with the same setup
                        reloads += 1;
                        tracing::info!("reload requested, continuing");
                    }
                    LoopDecision::Continue => {}
                }

                poller.run_cycle(state, channels);
                cycles += 1;
            }
        }
    }
}

/// Run as the daemon: never returns in the invoking process
///
/// The parent exits inside [`daemon::daemonize`]. In the daemon, the lock
/// file is released on every path out of this function.
pub fn run_daemon(config: DaemonConfig) -> Result<()> {
    let level = logging::level_from_env();
    let stderr_guard = logging::stderr_default(level);

    let mut lock = LockFile::acquire(&config.lock_path).context("Failed to become daemon process")?;

    let pid = match daemon::daemonize(&mut lock, level) {
        Ok(pid) => pid,
        Err(e) => {
            tracing::error!("{}", e);
            lock.release();
            return Err(e).context("Failed to become daemon process");
        }
    };
    drop(stderr_guard);

    tracing::info!(pid = pid.as_raw(), lock = %lock.path().display(), "daemon started");

    let result = serve(&config, &mut lock);
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }

    tracing::info!("daemon exiting");
    lock.release();
    logging::close_syslog();
    result
}

/// Everything after detachment
fn serve(config: &DaemonConfig, lock: &mut LockFile) -> Result<()> {
    lock.arm_emergency_release();
    signals::ignore_irrelevant().context("ConfigureSignalHandlers failed")?;
    signals::install_fatal_handlers().context("ConfigureSignalHandlers failed")?;

    // Safe now: the fork is behind us
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async {
        let state = Arc::new(ControlState::new());
        let control = ControlSignals::install().context("ConfigureSignalHandlers failed")?;
        let (dispatcher, mut terminate) = signals::spawn_dispatcher(control, Arc::clone(&state));

        let mut channels = DeviceChannels::open(config);
        let mut poller = Poller::new(config.brightness, AmixerRouter::default());

        let summary = poll_loop(
            &state,
            &mut channels,
            &mut poller,
            config.poll_interval,
            &mut terminate,
        )
        .await;

        dispatcher.abort();
        channels.close();
        tracing::info!(
            exit = ?summary.exit,
            cycles = summary.cycles,
            reloads = summary.reloads,
            "poll loop finished"
        );
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensors_core::MixerControl;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    #[derive(Default)]
    struct NullRouter;

    impl AudioRouter for NullRouter {
        fn mute(&mut self, _: MixerControl) -> io::Result<()> {
            Ok(())
        }
        fn unmute(&mut self, _: MixerControl) -> io::Result<()> {
            Ok(())
        }
    }

    fn config_in(temp_dir: &TempDir) -> DaemonConfig {
        let light = temp_dir.path().join("show_lux");
        let backlight = temp_dir.path().join("brightness");
        let jack = temp_dir.path().join("name");
        fs::write(&light, "150\n").unwrap();
        fs::write(&backlight, "100\n").unwrap();
        fs::write(&jack, "No Device\n").unwrap();

        DaemonConfig {
            lock_path: temp_dir.path().join("prime-sensors.pid"),
            light_sensor_path: light,
            backlight_path: backlight,
            audio_jack_path: jack,
            ..DaemonConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_stop_finishes_at_cycle_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let state = Arc::new(ControlState::new());
        let mut channels = DeviceChannels::open(&config);
        let mut poller = Poller::new(config.brightness, NullRouter);
        let (_tx, mut terminate) = mpsc::unbounded_channel();

        let stopper = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            stopper.request_shutdown();
        });

        let summary = poll_loop(
            &state,
            &mut channels,
            &mut poller,
            config.poll_interval,
            &mut terminate,
        )
        .await;

        // Ticks at 0s, 1s and 2s run; the 3s tick sees the flag
        assert_eq!(summary.exit, LoopExit::Graceful);
        assert_eq!(summary.cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_stop_skips_next_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let state = ControlState::new();
        let mut channels = DeviceChannels::open(&config);
        let mut poller = Poller::new(config.brightness, NullRouter);
        let (tx, mut terminate) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            tx.send(()).unwrap();
        });

        let summary = poll_loop(
            &state,
            &mut channels,
            &mut poller,
            config.poll_interval,
            &mut terminate,
        )
        .await;

        assert_eq!(summary.exit, LoopExit::Terminated);
        assert_eq!(summary.cycles, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_keeps_loop_running() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let state = Arc::new(ControlState::new());
        let mut channels = DeviceChannels::open(&config);
        let mut poller = Poller::new(config.brightness, NullRouter);
        let (_tx, mut terminate) = mpsc::unbounded_channel();

        let controller = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            controller.request_reload();
            tokio::time::sleep(Duration::from_millis(2000)).await;
            controller.request_shutdown();
        });

        let summary = poll_loop(
            &state,
            &mut channels,
            &mut poller,
            config.poll_interval,
            &mut terminate,
        )
        .await;

        assert_eq!(summary.exit, LoopExit::Graceful);
        assert_eq!(summary.reloads, 1);
        assert_eq!(summary.cycles, 4);
        assert!(!state.reload_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_terminate_channel_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let state = Arc::new(ControlState::new());
        let mut channels = DeviceChannels::open(&config);
        let mut poller = Poller::new(config.brightness, NullRouter);
        let (tx, mut terminate) = mpsc::unbounded_channel::<()>();
        drop(tx);

        let stopper = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            stopper.request_shutdown();
        });

        let summary = poll_loop(
            &state,
            &mut channels,
            &mut poller,
            config.poll_interval,
            &mut terminate,
        )
        .await;

        assert_eq!(summary.exit, LoopExit::Graceful);
        assert_eq!(summary.cycles, 1);
    }
}
