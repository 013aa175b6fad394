//! The group runner (§4.8): bounded-concurrency fan-out of one prompt
//! across a group's session ids, driven through `Supervisor::spawn_exec`.
//! Admission is bounded by `max_concurrent`; in-flight spawns race via
//! `FuturesUnordered` so the runner learns which session settled first,
//! not just that a slot freed up.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use codex_agent_core::Group;
use codex_agent_supervisor::{SpawnOptions, Supervisor};
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::error::DispatchError;

/// Default bounded concurrency for `run_group`, per §4.8.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupEvent {
    SessionStarted {
        session_id: String,
    },
    SessionCompleted {
        session_id: String,
        exit_code: i32,
    },
    SessionFailed {
        session_id: String,
        exit_code: i32,
    },
    GroupCompleted {
        running: Vec<String>,
        completed: Vec<String>,
        failed: Vec<String>,
        pending: Vec<String>,
    },
}

type SpawnFuture = Pin<Box<dyn Future<Output = (String, i32)> + Send>>;

/// Fans `prompt` out across `group.session_ids` in order, admitting up to
/// `max_concurrent` spawns at a time. Fails fast (before spawning
/// anything) if the group is paused. A task that errors rather than
/// exiting is mapped to exit code `1`; the group always runs to
/// completion regardless of individual failures.
pub fn run_group(
    supervisor: Arc<Supervisor>,
    group: Group,
    prompt: String,
    opts: SpawnOptions,
    max_concurrent: usize,
) -> Result<impl Stream<Item = GroupEvent>, DispatchError> {
    if group.paused {
        return Err(DispatchError::GroupPaused(group.id));
    }

    Ok(async_stream::stream! {
        let mut pending: VecDeque<String> = group.session_ids.into_iter().collect();
        let mut running: Vec<String> = Vec::new();
        let mut completed: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut inflight: FuturesUnordered<SpawnFuture> = FuturesUnordered::new();

        loop {
            while inflight.len() < max_concurrent {
                let Some(session_id) = pending.pop_front() else { break };
                running.push(session_id.clone());

                let supervisor = Arc::clone(&supervisor);
                let prompt = prompt.clone();
                let opts = opts.clone();
                let task_id = session_id.clone();
                inflight.push(Box::pin(async move {
                    let exit_code = match supervisor.spawn_exec(&prompt, &opts).await {
                        Ok(result) => result.exit_code,
                        Err(err) => {
                            warn!(session_id = %task_id, %err, "group fan-out spawn failed");
                            1
                        }
                    };
                    (task_id, exit_code)
                }));

                yield GroupEvent::SessionStarted { session_id };
            }

            let Some((session_id, exit_code)) = inflight.next().await else {
                break;
            };
            running.retain(|id| id != &session_id);
            if exit_code == 0 {
                completed.push(session_id.clone());
                yield GroupEvent::SessionCompleted { session_id, exit_code };
            } else {
                failed.push(session_id.clone());
                yield GroupEvent::SessionFailed { session_id, exit_code };
            }
        }

        yield GroupEvent::GroupCompleted {
            running,
            completed,
            failed,
            pending: pending.into_iter().collect(),
        };
    })
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

    fn group_with(ids: Vec<&str>) -> Group {
        let mut group = Group::new("fleet".to_string(), None);
        for id in ids {
            group.add_session(id.to_string());
        }
        group
    }

    #[tokio::test]
    async fn paused_group_fails_fast_and_spawns_nothing() {
        let supervisor = Arc::new(Supervisor::new("/nonexistent/codex-test-binary"));
        let mut group = group_with(vec!["s1"]);
        group.paused = true;

        let err = run_group(supervisor, group, "hi".to_string(), SpawnOptions::default(), 3)
            .err()
            .unwrap();
        assert!(matches!(err, DispatchError::GroupPaused(_)));
    }

    #[tokio::test]
    async fn empty_group_completes_immediately() {
        let supervisor = Arc::new(Supervisor::new("/nonexistent/codex-test-binary"));
        let group = group_with(vec![]);

        let stream = run_group(supervisor, group, "hi".to_string(), SpawnOptions::default(), 3).unwrap();
        futures::pin_mut!(stream);
        let event = stream.next().await.unwrap();
        assert!(matches!(event, GroupEvent::GroupCompleted { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn fans_out_every_session_and_reports_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "exit 0");
        let supervisor = Arc::new(Supervisor::new(script.display().to_string()));
        let group = group_with(vec!["s1", "s2", "s3"]);

        let stream = run_group(supervisor, group, "hi".to_string(), SpawnOptions::default(), 2).unwrap();
        futures::pin_mut!(stream);

        let mut started = Vec::new();
        let mut completed = Vec::new();
        loop {
            match stream.next().await.unwrap() {
                GroupEvent::SessionStarted { session_id } => started.push(session_id),
                GroupEvent::SessionCompleted { session_id, exit_code } => {
                    assert_eq!(exit_code, 0);
                    completed.push(session_id);
                }
                GroupEvent::GroupCompleted { running, completed: c, failed, pending } => {
                    assert!(running.is_empty());
                    assert!(pending.is_empty());
                    assert!(failed.is_empty());
                    assert_eq!(c.len(), 3);
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(started.len(), 3);
        assert_eq!(completed.len(), 3);
    }

    #[tokio::test]
    async fn respects_max_concurrent_admission_bound() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "sleep 0.2\nexit 0");
        let supervisor = Arc::new(Supervisor::new(script.display().to_string()));
        let group = group_with(vec!["s1", "s2", "s3", "s4"]);

        let stream = run_group(supervisor, group, "hi".to_string(), SpawnOptions::default(), 2).unwrap();
        futures::pin_mut!(stream);

        let mut started_before_first_completion = 0;
        loop {
            match stream.next().await.unwrap() {
                GroupEvent::SessionStarted { .. } => started_before_first_completion += 1,
                GroupEvent::SessionCompleted { .. } | GroupEvent::SessionFailed { .. } => break,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(started_before_first_completion, 2);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "exit 7");
        let supervisor = Arc::new(Supervisor::new(script.display().to_string()));
        let group = group_with(vec!["s1"]);

        let stream = run_group(supervisor, group, "hi".to_string(), SpawnOptions::default(), 3).unwrap();
        futures::pin_mut!(stream);

        stream.next().await; // session_started
        let event = stream.next().await.unwrap();
        assert!(matches!(
            event,
            GroupEvent::SessionFailed { exit_code: 7, .. }
        ));
    }
}
