//! The daemon pid-file lifecycle operations (§6, §9): `start_daemon`
//! detaches a foreground-mode child process and confirms it's healthy
//! before recording its pid; `stop_daemon` terminates the recorded pid
//! and removes the file; `daemon_status` reads the tri-state directly.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use codex_agent_core::{DaemonMode, DaemonPidFile, DaemonStatusKind};

use crate::pidfile::{self, pid_file_path};

const HEALTH_POLL_BUDGET: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("daemon is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("failed to spawn daemon process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("daemon did not become healthy within the startup budget")]
    HealthTimeout,
    #[error("no daemon is running")]
    NotRunning,
}

async fn health_answers(host: &str, port: u16) -> bool {
    let url = format!("http://{host}:{port}/health");
    reqwest::Client::new()
        .get(&url)
        .timeout(Duration::from_secs(2))
        .send()
        .await
        .map(|resp| resp.status().is_success())
        .unwrap_or(false)
}

/// Spawns `binary` with `args` detached from the current process (stdio
/// fully redirected, no controlling terminal dependency), polls its
/// `/health` endpoint for up to 10s at 200ms intervals, and on success
/// writes the pid-file recording the child's pid. Refuses to start if an
/// existing pid-file's health endpoint already answers.
pub async fn start_daemon(
    config_dir: &Path,
    binary: &Path,
    args: &[String],
    host: &str,
    port: u16,
    mode: DaemonMode,
) -> Result<DaemonPidFile, LifecycleError> {
    let path = pid_file_path(config_dir);
    if let Some(existing) = pidfile::read_pid_file(&path) {
        if pidfile::is_pid_alive(existing.pid) && health_answers(&existing.host, existing.port).await {
            return Err(LifecycleError::AlreadyRunning(existing.pid));
        }
    }

    let mut command = std::process::Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let child = command.spawn()?;
    let pid = child.id();
    // Intentionally not waited on: the child outlives this call, running
    // the daemon's own foreground server loop.
    std::mem::forget(child);

    let deadline = tokio::time::Instant::now() + HEALTH_POLL_BUDGET;
    loop {
        if health_answers(host, port).await {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(LifecycleError::HealthTimeout);
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }

    let record = pidfile::build_record(pid, port, host.to_string(), mode);
    pidfile::write_pid_file(&path, &record).map_err(LifecycleError::Spawn)?;
    Ok(record)
}

/// SIGTERMs the recorded pid and removes the pid-file. A no-op (but not
/// an error) if the daemon was already stopped.
pub fn stop_daemon(config_dir: &Path) -> Result<(), LifecycleError> {
    let path = pid_file_path(config_dir);
    let Some(record) = pidfile::read_pid_file(&path) else {
        return Err(LifecycleError::NotRunning);
    };
    if pidfile::is_pid_alive(record.pid) {
        pidfile::terminate_pid(record.pid);
    }
    pidfile::remove_pid_file(&path);
    Ok(())
}

pub fn daemon_status(config_dir: &Path) -> (DaemonStatusKind, Option<DaemonPidFile>) {
    pidfile::status(&pid_file_path(config_dir))
}

pub fn default_pid_file_path(config_dir: &Path) -> PathBuf {
    pid_file_path(config_dir)
}
