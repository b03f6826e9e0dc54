//! Control client against real processes

use prime_sensors::control::{self, ControlCommand, ControlError};
use sensors_core::config::LOCK_FILE_PATH;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, Command};
use tempfile::TempDir;

/// Stand-in daemon whose default signal dispositions terminate it
fn spawn_target() -> Child {
    Command::new("sleep").arg("30").spawn().unwrap()
}

fn write_lock(dir: &TempDir, child: &Child) -> std::path::PathBuf {
    let path = dir.path().join("prime-sensors.pid");
    fs::write(&path, format!("{}\n", child.id())).unwrap();
    path
}

fn expect_signalled(mut child: Child, signal: i32) {
    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(signal), "status: {:?}", status);
}

#[test]
fn test_stop_sends_sigusr1() {
    let temp_dir = TempDir::new().unwrap();
    let child = spawn_target();
    let lock = write_lock(&temp_dir, &child);

    let pid = control::send(&lock, ControlCommand::Stop).unwrap();
    assert_eq!(pid.as_raw(), child.id() as i32);
    expect_signalled(child, nix::libc::SIGUSR1);
}

#[test]
fn test_restart_sends_sighup() {
    let temp_dir = TempDir::new().unwrap();
    let child = spawn_target();
    let lock = write_lock(&temp_dir, &child);

    control::send(&lock, ControlCommand::Restart).unwrap();
    expect_signalled(child, nix::libc::SIGHUP);
}

#[test]
fn test_sensorstate_sends_sigusr2() {
    let temp_dir = TempDir::new().unwrap();
    let child = spawn_target();
    let lock = write_lock(&temp_dir, &child);

    control::send(&lock, ControlCommand::Sensorstate).unwrap();
    expect_signalled(child, nix::libc::SIGUSR2);
}

#[test]
fn test_missing_lock_sends_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let err = control::send(&temp_dir.path().join("absent.pid"), ControlCommand::Stop).unwrap_err();
    assert!(matches!(err, ControlError::LockUnreadable { .. }));
}

#[test]
fn test_unknown_command_prints_usage() {
    let output = Command::new(env!("CARGO_BIN_EXE_prime-sensors"))
        .arg("bogus")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}

#[test]
fn test_stop_without_daemon_fails() {
    if Path::new(LOCK_FILE_PATH).exists() {
        // A real daemon is installed on this machine; leave it alone
        return;
    }

    let output = Command::new(env!("CARGO_BIN_EXE_prime-sensors"))
        .arg("stop")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not running"), "stderr: {}", stderr);
    assert!(stderr.contains("Usage"), "stderr: {}", stderr);
}
