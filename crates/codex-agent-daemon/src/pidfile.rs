//! The daemon pid-file lifecycle (§6, §9): a structured `DaemonPidFile`
//! JSON record rather than a bare pid, but the same `kill -0`/`kill
//! -TERM` shellout idiom as the rate-limit-wait daemon.

use std::path::{Path, PathBuf};
use std::process::Command;

use codex_agent_core::{atomic_write_json_pretty, DaemonMode, DaemonPidFile, DaemonStatusKind};

pub fn pid_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join("daemon.pid")
}

pub fn read_pid_file(path: &Path) -> Option<DaemonPidFile> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn write_pid_file(path: &Path, record: &DaemonPidFile) -> std::io::Result<()> {
    atomic_write_json_pretty(path, record)
}

pub fn remove_pid_file(path: &Path) {
    let _ = std::fs::remove_file(path);
}

#[cfg(unix)]
pub fn is_pid_alive(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_pid_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
pub fn terminate_pid(pid: u32) {
    let _ = Command::new("kill").args(["-TERM", &pid.to_string()]).status();
}

#[cfg(not(unix))]
pub fn terminate_pid(_pid: u32) {}

/// Tri-state derivation from §6: `stopped` if no file, `running` if the
/// recorded pid is alive, `stale` otherwise.
pub fn status(path: &Path) -> (DaemonStatusKind, Option<DaemonPidFile>) {
    match read_pid_file(path) {
        None => (DaemonStatusKind::Stopped, None),
        Some(record) => {
            if is_pid_alive(record.pid) {
                (DaemonStatusKind::Running, Some(record))
            } else {
                (DaemonStatusKind::Stale, Some(record))
            }
        }
    }
}

pub fn build_record(pid: u32, port: u16, host: String, mode: DaemonMode) -> DaemonPidFile {
    DaemonPidFile {
        pid,
        port,
        host,
        started_at: chrono::Utc::now(),
        mode,
    }
}
