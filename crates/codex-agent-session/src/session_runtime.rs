//! Orchestration for `RunningSession` (§4.6's `startSession`/`resumeSession`):
//! wires the supervisor's streamed spawn together with the rollout
//! watcher and the session index, including the resume background
//! attacher and the exit-poll watcher that stop the tailer once the
//! process leaves `running`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use codex_agent_core::Line;
use codex_agent_index::find_session;
use codex_agent_rollout::{read_all, RolloutEvent, RolloutWatcher};
use codex_agent_supervisor::{ExecStream, SpawnOptions, Supervisor};
use tracing::warn;

use crate::error::SessionError;
use crate::running_session::{RunningSession, StreamGranularity};
use crate::events::SessionEvents;

const RESUME_ATTACH_INTERVAL: Duration = Duration::from_millis(100);
const RESUME_ATTACH_ATTEMPTS: usize = 20;

/// Configuration for `start_session`.
#[derive(Debug, Clone, Default)]
pub struct StartConfig {
    pub prompt: String,
    pub resume_session_id: Option<String>,
    pub spawn: SpawnOptions,
    pub granularity: StreamGranularity,
    /// When resuming, whether to replay the session's existing rollout
    /// lines through `push_line` before the appended tail.
    pub replay_existing: bool,
}

fn placeholder_id() -> String {
    format!("pending-{}", chrono::Utc::now().timestamp_millis())
}

fn spawn_exit_watcher(
    supervisor: Arc<Supervisor>,
    session: Arc<RunningSession>,
    process_id: String,
    completion: tokio::sync::oneshot::Receiver<i32>,
    watcher: Option<RolloutWatcher>,
) {
    let _ = (supervisor, process_id);
    tokio::spawn(async move {
        let exit_code = completion.await.unwrap_or(1);
        if let Some(watcher) = watcher {
            watcher.stop();
        }
        session.finish(exit_code);
    });
}

fn spawn_line_forwarder(
    session: Arc<RunningSession>,
    mut lines: tokio::sync::mpsc::UnboundedReceiver<Line>,
) {
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            session.push_line(line);
        }
    });
}

/// `startSession`: spawns a brand-new `exec` run with a placeholder id
/// that is replaced once the first `session_meta` resolves (§4.6).
pub async fn start_session(
    home: PathBuf,
    supervisor: Arc<Supervisor>,
    config: StartConfig,
) -> Result<(Arc<RunningSession>, SessionEvents), SessionError> {
    if config.resume_session_id.is_some() {
        return resume_session(home, supervisor, config).await;
    }

    let ExecStream {
        id: process_id,
        lines,
        completion,
    } = supervisor
        .spawn_exec_stream(&config.prompt, &config.spawn)
        .await?;

    let (session, events) = RunningSession::new(
        placeholder_id(),
        true,
        config.granularity,
        Arc::clone(&supervisor),
        process_id.clone(),
        None,
    );

    spawn_line_forwarder(Arc::clone(&session), lines);
    spawn_exit_watcher(supervisor, Arc::clone(&session), process_id, completion, None);

    Ok((session, events))
}

/// `resumeSession`: looks the session up in the index, attaches a
/// rollout-file tailer (racing the tool's own rollout-file creation via
/// a background attacher if the lookup misses), and spawns `resume`.
pub async fn resume_session(
    home: PathBuf,
    supervisor: Arc<Supervisor>,
    config: StartConfig,
) -> Result<(Arc<RunningSession>, SessionEvents), SessionError> {
    let session_id = config
        .resume_session_id
        .clone()
        .ok_or_else(|| SessionError::NotFound("no resume_session_id given".to_string()))?;

    let prompt = if config.prompt.is_empty() {
        None
    } else {
        Some(config.prompt.as_str())
    };

    let ExecStream {
        id: process_id,
        lines,
        completion,
    } = supervisor
        .spawn_resume(&session_id, &config.spawn, prompt)
        .await?;

    let (session, events) = RunningSession::new(
        session_id.clone(),
        false,
        config.granularity,
        Arc::clone(&supervisor),
        process_id.clone(),
        None,
    );

    spawn_line_forwarder(Arc::clone(&session), lines);

    let watcher = match find_session(&home, &session_id).await {
        Some(record) => {
            if config.replay_existing {
                if let Ok(existing) = read_all(&record.rollout_path).await {
                    for line in existing {
                        session.push_line(line);
                    }
                }
            }
            Some(attach_watcher(Arc::clone(&session), record.rollout_path)?)
        }
        None => {
            spawn_background_attacher(home, Arc::clone(&session), session_id, config.replay_existing);
            None
        }
    };

    spawn_exit_watcher(supervisor, session.clone(), process_id, completion, watcher);

    Ok((session, events))
}

fn attach_watcher(
    session: Arc<RunningSession>,
    rollout_path: PathBuf,
) -> Result<RolloutWatcher, SessionError> {
    let (watcher, mut events) =
        RolloutWatcher::spawn().map_err(|e| SessionError::Watch(e.to_string()))?;
    watcher
        .watch_file(&rollout_path)
        .map_err(|e| SessionError::Watch(e.to_string()))?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RolloutEvent::Appended { lines, .. } => {
                    for line in lines {
                        session.push_line(line);
                    }
                }
                RolloutEvent::ReadError { path, message } => {
                    warn!(?path, %message, "rollout watcher read error");
                }
                RolloutEvent::NewSessionFile { .. } => {}
            }
        }
    });

    Ok(watcher)
}

/// Retries the index lookup every 100ms for up to 20 attempts, the race
/// window for the tool to create the rollout file after process start
/// (§4.6 step 3).
fn spawn_background_attacher(
    home: PathBuf,
    session: Arc<RunningSession>,
    session_id: String,
    replay_existing: bool,
) {
    tokio::spawn(async move {
        for _ in 0..RESUME_ATTACH_ATTEMPTS {
            tokio::time::sleep(RESUME_ATTACH_INTERVAL).await;
            if let Some(record) = find_session(&home, &session_id).await {
                if replay_existing {
                    if let Ok(existing) = read_all(&record.rollout_path).await {
                        for line in existing {
                            session.push_line(line);
                        }
                    }
                }
                if let Ok((watcher, mut events)) = RolloutWatcher::spawn() {
                    if watcher.watch_file(&record.rollout_path).is_ok() {
                        tokio::spawn(async move {
                            while let Some(event) = events.recv().await {
                                if let RolloutEvent::Appended { lines, .. } = event {
                                    for line in lines {
                                        session.push_line(line);
                                    }
                                }
                            }
                        });
                    }
                }
                return;
            }
        }
    });
}
