//! Process supervisor (§4.5): spawns, tracks, and tears down tool
//! subprocesses, multiplexing stdout into parsed rollout lines and exit
//! status into completion futures. Each tracked child is held behind
//! `RwLock<Option<Child>>` with `kill_on_drop` set as a belt-and-suspenders
//! guard against leaking a process past the tracking entry's lifetime.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use codex_agent_rollout::parse;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SupervisorError;
use crate::options::{push_common_flags, ForkOptions, SpawnOptions};
use crate::process::{ProcessInfo, ProcessStatus};

const DEFAULT_BINARY: &str = "codex";

struct Tracked {
    child: Option<Child>,
    info: ProcessInfo,
}

/// The result of a fully-drained `spawn_exec` call.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub lines: Vec<codex_agent_core::Line>,
}

/// A live, still-running spawn: a stream of parsed lines plus a
/// completion signal, for callers that want to consume output as it
/// arrives rather than waiting for the process to exit.
pub struct ExecStream {
    pub id: String,
    pub lines: mpsc::UnboundedReceiver<codex_agent_core::Line>,
    pub completion: oneshot::Receiver<i32>,
}

pub struct Supervisor {
    binary: String,
    processes: Arc<RwLock<HashMap<String, Arc<RwLock<Tracked>>>>>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl Supervisor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            processes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn build_command(&self, args: &[String], cwd: Option<&std::path::Path>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    fn command_string(&self, args: &[String]) -> String {
        std::iter::once(self.binary.clone())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn track(&self, id: String, info: ProcessInfo, child: Option<Child>) {
        self.processes
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(Tracked { child, info })));
    }

    /// `<binary> exec --json <prompt> [--image P]… <common flags>`, stdio
    /// `(ignore, pipe, pipe)`. Reads stdout to EOF, parsing each line
    /// through the rollout codec, and returns the eventual exit code. A
    /// spawn failure resolves the exit code to `1` rather than
    /// propagating, matching the exit-code policy of §4.5.
    pub async fn spawn_exec(
        &self,
        prompt: &str,
        opts: &SpawnOptions,
    ) -> Result<ExecResult, SupervisorError> {
        let mut args = vec!["exec".to_string(), "--json".to_string(), prompt.to_string()];
        push_common_flags(&mut args, opts);
        let id = Self::new_id();
        let command = self.command_string(&args);

        let mut cmd = self.build_command(&args, opts.cwd.as_deref());
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(%command, error = %err, "failed to spawn exec");
                self.track(
                    id.clone(),
                    ProcessInfo {
                        id,
                        pid: None,
                        command,
                        prompt: Some(prompt.to_string()),
                        started_at: Utc::now(),
                        status: ProcessStatus::Exited,
                        exit_code: Some(1),
                    },
                    None,
                )
                .await;
                return Ok(ExecResult {
                    exit_code: 1,
                    lines: Vec::new(),
                });
            }
        };

        let pid = child.id();
        let stdout = child.stdout.take().expect("stdout piped");
        let mut reader = BufReader::new(stdout).lines();
        let mut lines = Vec::new();
        while let Ok(Some(raw)) = reader.next_line().await {
            if let Some(line) = parse(&raw) {
                lines.push(line);
            }
        }

        let status = child.wait().await;
        let exit_code = status
            .ok()
            .and_then(|s| s.code())
            .unwrap_or(1);

        self.track(
            id.clone(),
            ProcessInfo {
                id,
                pid,
                command,
                prompt: Some(prompt.to_string()),
                started_at: Utc::now(),
                status: ProcessStatus::Exited,
                exit_code: Some(exit_code),
            },
            None,
        )
        .await;

        Ok(ExecResult { exit_code, lines })
    }

    /// Same spawn as `spawn_exec`, but hands the caller a live stream of
    /// parsed lines plus a completion future instead of blocking to EOF.
    pub async fn spawn_exec_stream(
        &self,
        prompt: &str,
        opts: &SpawnOptions,
    ) -> Result<ExecStream, SupervisorError> {
        let mut args = vec!["exec".to_string(), "--json".to_string(), prompt.to_string()];
        push_common_flags(&mut args, opts);
        self.spawn_streaming(args, Some(prompt.to_string()), opts.cwd.as_deref(), false)
            .await
    }

    /// `resume <sessionId> <common flags>…`, stdio `(pipe, pipe, pipe)`.
    pub async fn spawn_resume(
        &self,
        session_id: &str,
        opts: &SpawnOptions,
        prompt: Option<&str>,
    ) -> Result<ExecStream, SupervisorError> {
        let mut args = vec!["resume".to_string(), session_id.to_string()];
        push_common_flags(&mut args, opts);
        self.spawn_streaming(args, prompt.map(str::to_string), opts.cwd.as_deref(), true)
            .await
    }

    /// `fork <sessionId> [--nth-message N] <common flags>…`, stdio
    /// `(pipe, pipe, pipe)`.
    pub async fn spawn_fork(
        &self,
        session_id: &str,
        opts: &ForkOptions,
    ) -> Result<ExecStream, SupervisorError> {
        let mut args = vec!["fork".to_string(), session_id.to_string()];
        if let Some(nth) = opts.nth_message {
            args.push("--nth-message".to_string());
            args.push(nth.to_string());
        }
        push_common_flags(&mut args, &opts.spawn);
        self.spawn_streaming(args, None, opts.spawn.cwd.as_deref(), true)
            .await
    }

    async fn spawn_streaming(
        &self,
        args: Vec<String>,
        prompt: Option<String>,
        cwd: Option<&std::path::Path>,
        pipe_stdin: bool,
    ) -> Result<ExecStream, SupervisorError> {
        let id = Self::new_id();
        let command = self.command_string(&args);
        let mut cmd = self.build_command(&args, cwd);
        cmd.stdin(if pipe_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        let pid = child.id();
        let stdout = child.stdout.take().expect("stdout piped");
        let mut stderr = child.stderr.take().expect("stderr piped");

        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = oneshot::channel();

        self.track(
            id.clone(),
            ProcessInfo {
                id: id.clone(),
                pid,
                command,
                prompt,
                started_at: Utc::now(),
                status: ProcessStatus::Running,
                exit_code: None,
            },
            Some(child),
        )
        .await;

        // Stdout is fanned into `lines_tx` by a reader task; exit is
        // observed by a second task that also drains stderr so the child
        // never blocks on a full pipe.
        let processes = Arc::clone(&self.processes);
        let reader_id = id.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            loop {
                match reader.next_line().await {
                    Ok(Some(raw)) => {
                        if let Some(line) = parse(&raw) {
                            let _ = lines_tx.send(line);
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(id = %reader_id, error = %err, "stdout read error");
                        break;
                    }
                }
            }
        });

        let stderr_id = id.clone();
        tokio::spawn(async move {
            let mut buf = String::new();
            if stderr.read_to_string(&mut buf).await.is_ok() && !buf.is_empty() {
                debug!(id = %stderr_id, stderr = %buf, "process stderr");
            }
        });

        tokio::spawn(async move {
            let tracked = {
                let map = processes.read().await;
                map.get(&id).cloned()
            };
            let Some(tracked) = tracked else { return };

            let exit_code = loop {
                let mut guard = tracked.write().await;
                if guard.info.status != ProcessStatus::Running {
                    break guard.info.exit_code.unwrap_or(1);
                }
                let Some(child) = guard.child.as_mut() else {
                    break 1;
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        let code = status.code().unwrap_or(1);
                        guard.info.status = ProcessStatus::Exited;
                        guard.info.exit_code = Some(code);
                        break code;
                    }
                    Ok(None) => {
                        drop(guard);
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                    Err(err) => {
                        warn!(id = %id, error = %err, "failed to poll exit status");
                        guard.info.status = ProcessStatus::Exited;
                        guard.info.exit_code = Some(1);
                        break 1;
                    }
                }
            };
            let _ = completion_tx.send(exit_code);
        });

        Ok(ExecStream {
            id,
            lines: lines_rx,
            completion: completion_rx,
        })
    }

    pub async fn list(&self) -> Vec<ProcessInfo> {
        let map = self.processes.read().await;
        let mut infos = Vec::with_capacity(map.len());
        for tracked in map.values() {
            infos.push(tracked.read().await.info.clone());
        }
        infos
    }

    pub async fn get(&self, id: &str) -> Result<ProcessInfo, SupervisorError> {
        let map = self.processes.read().await;
        let tracked = map
            .get(id)
            .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?;
        Ok(tracked.read().await.info.clone())
    }

    /// SIGTERM via `Child::kill`, only if the process is currently
    /// `running`; sets status to `killed`.
    pub async fn kill(&self, id: &str) -> Result<(), SupervisorError> {
        let map = self.processes.read().await;
        let tracked = map
            .get(id)
            .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?
            .clone();
        drop(map);

        let mut guard = tracked.write().await;
        if guard.info.status != ProcessStatus::Running {
            return Ok(());
        }
        if let Some(child) = guard.child.as_mut() {
            let _ = child.kill().await;
        }
        guard.info.status = ProcessStatus::Killed;
        guard.info.exit_code = guard.info.exit_code.or(Some(1));
        info!(id, "process killed");
        Ok(())
    }

    pub async fn kill_all(&self) {
        let ids: Vec<String> = self.processes.read().await.keys().cloned().collect();
        for id in ids {
            let _ = self.kill(&id).await;
        }
    }

    /// Writes `data` to the process's stdin; requires it to be running
    /// and to have been spawned with a piped stdin.
    pub async fn write_input(&self, id: &str, data: &str) -> Result<(), SupervisorError> {
        let map = self.processes.read().await;
        let tracked = map
            .get(id)
            .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?
            .clone();
        drop(map);

        let mut guard = tracked.write().await;
        if guard.info.status != ProcessStatus::Running {
            return Err(SupervisorError::NotRunning(id.to_string()));
        }
        let child = guard
            .child
            .as_mut()
            .ok_or_else(|| SupervisorError::NoStdin(id.to_string()))?;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| SupervisorError::NoStdin(id.to_string()))?;
        stdin.write_all(data.as_bytes()).await?;
        Ok(())
    }

    /// Removes every non-`running` entry, returning the count removed.
    pub async fn prune(&self) -> usize {
        let mut map = self.processes.write().await;
        let mut to_remove = Vec::new();
        for (id, tracked) in map.iter() {
            if tracked.read().await.info.status != ProcessStatus::Running {
                to_remove.push(id.clone());
            }
        }
        let count = to_remove.len();
        for id in to_remove {
            map.remove(&id);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    const META_LINE: &str = r#"{"timestamp":"2026-01-01T00:00:00Z","type":"session_meta","payload":{"id":"sess-1","timestamp":"2026-01-01T00:00:00Z","cwd":"/work","originator":"cli","cli_version":"1.0.0","source":"cli"}}"#;

    #[tokio::test]
    async fn spawn_exec_parses_stdout_and_returns_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", &format!("echo '{META_LINE}'\nexit 0"));
        let supervisor = Supervisor::new(script.display().to_string());

        let result = supervisor
            .spawn_exec("hello", &SpawnOptions::default())
            .await
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.lines.len(), 1);
    }

    #[tokio::test]
    async fn spawn_exec_reports_nonzero_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "exit 3");
        let supervisor = Supervisor::new(script.display().to_string());

        let result = supervisor
            .spawn_exec("hello", &SpawnOptions::default())
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(result.lines.is_empty());
    }

    #[tokio::test]
    async fn spawn_exec_missing_binary_resolves_exit_code_one() {
        let supervisor = Supervisor::new("/nonexistent/codex-agent-test-binary");
        let result = supervisor
            .spawn_exec("hello", &SpawnOptions::default())
            .await
            .unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn spawn_exec_stream_yields_lines_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", &format!("echo '{META_LINE}'\nexit 0"));
        let supervisor = Supervisor::new(script.display().to_string());

        let mut stream = supervisor
            .spawn_exec_stream("hello", &SpawnOptions::default())
            .await
            .unwrap();

        let line = tokio::time::timeout(std::time::Duration::from_secs(2), stream.lines.recv())
            .await
            .expect("line should arrive")
            .expect("channel stays open");
        assert!(line.kind.as_session_meta().is_some());

        let exit_code = tokio::time::timeout(std::time::Duration::from_secs(2), stream.completion)
            .await
            .expect("completion should resolve")
            .unwrap();
        assert_eq!(exit_code, 0);

        let info = supervisor.get(&stream.id).await.unwrap();
        assert_eq!(info.status, ProcessStatus::Exited);
        assert_eq!(info.exit_code, Some(0));
    }

    #[tokio::test]
    async fn kill_marks_a_running_process_killed() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "sleep 30");
        let supervisor = Supervisor::new(script.display().to_string());

        let stream = supervisor
            .spawn_exec_stream("hello", &SpawnOptions::default())
            .await
            .unwrap();

        supervisor.kill(&stream.id).await.unwrap();
        let info = supervisor.get(&stream.id).await.unwrap();
        assert_eq!(info.status, ProcessStatus::Killed);
    }

    #[tokio::test]
    async fn write_input_fails_without_a_piped_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "sleep 30");
        let supervisor = Supervisor::new(script.display().to_string());

        let stream = supervisor
            .spawn_exec_stream("hello", &SpawnOptions::default())
            .await
            .unwrap();

        let err = supervisor.write_input(&stream.id, "data").await.unwrap_err();
        assert!(matches!(err, SupervisorError::NoStdin(_)));
        supervisor.kill(&stream.id).await.unwrap();
    }

    #[tokio::test]
    async fn prune_removes_only_non_running_entries() {
        let dir = tempfile::tempdir().unwrap();
        let exited = write_script(dir.path(), "exited", "exit 0");
        let running = write_script(dir.path(), "running", "sleep 30");

        let supervisor = Supervisor::new(exited.display().to_string());
        supervisor
            .spawn_exec("hello", &SpawnOptions::default())
            .await
            .unwrap();

        let running_supervisor = Supervisor::new(running.display().to_string());
        let stream = running_supervisor
            .spawn_exec_stream("hello", &SpawnOptions::default())
            .await
            .unwrap();

        assert_eq!(supervisor.prune().await, 1);
        assert_eq!(supervisor.list().await.len(), 0);

        running_supervisor.kill(&stream.id).await.unwrap();
        assert_eq!(running_supervisor.prune().await, 1);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let supervisor = Supervisor::default();
        let err = supervisor.get("missing").await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound(_)));
    }
}
