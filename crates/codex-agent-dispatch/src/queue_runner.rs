//! The queue runner (§4.9): sequential execution of a queue's pending
//! prompts, checked for a stop signal only between prompts (never
//! interrupting one in flight), persisting the whole queue through
//! `QueueRepository::save_queue` after every prompt settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use codex_agent_core::{PromptResult, PromptStatus, Queue, QueuedPrompt};
use codex_agent_repo::QueueRepository;
use codex_agent_supervisor::{SpawnOptions, Supervisor};
use futures::Stream;
use tracing::warn;

/// A cooperative stop flag shared between a runner task and whoever asked
/// it to stop (e.g. `POST /api/queues/:id/stop`). Checked between prompts
/// only — the prompt currently executing always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct QueueSplit {
    pub pending: Vec<String>,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

/// Splits a queue's prompt ids by terminal/non-terminal status. Running
/// prompts are reported under `pending`, since from the outside a stopped
/// run leaves nothing actually in flight.
pub fn queue_split(queue: &Queue) -> QueueSplit {
    let mut split = QueueSplit::default();
    for prompt in &queue.prompts {
        match prompt.status {
            PromptStatus::Completed => split.completed.push(prompt.id.clone()),
            PromptStatus::Failed => split.failed.push(prompt.id.clone()),
            PromptStatus::Pending | PromptStatus::Running => split.pending.push(prompt.id.clone()),
        }
    }
    split
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    QueueStopped { split: QueueSplit },
    PromptStarted { prompt_id: String },
    PromptCompleted { prompt_id: String, exit_code: i32 },
    PromptFailed { prompt_id: String, exit_code: i32 },
    QueueCompleted,
}

/// Runs every pending prompt in `queue` in order. A paused queue, or a
/// `stop_signal` already set, yields a single `QueueStopped` and spawns
/// nothing. `opts.cwd` is always overridden with `queue.project_path`;
/// `opts.images` is appended after each prompt's own images per
/// `images:merge(prompt.images, opts.images)`.
pub fn run_queue(
    supervisor: Arc<Supervisor>,
    repo: Arc<QueueRepository>,
    mut queue: Queue,
    opts: SpawnOptions,
    stop_signal: Option<StopSignal>,
) -> impl Stream<Item = QueueEvent> {
    async_stream::stream! {
        if queue.paused {
            yield QueueEvent::QueueStopped { split: queue_split(&queue) };
            return;
        }

        let pending_ids: Vec<String> = queue
            .prompts
            .iter()
            .filter(|p| p.status == PromptStatus::Pending)
            .map(|p| p.id.clone())
            .collect();

        for prompt_id in pending_ids {
            if stop_signal.as_ref().is_some_and(|s| s.is_stopped()) {
                yield QueueEvent::QueueStopped { split: queue_split(&queue) };
                return;
            }

            let Some(prompt) = queue.prompts.iter().find(|p| p.id == prompt_id).cloned() else {
                continue;
            };
            if prompt.status != PromptStatus::Pending {
                continue;
            }

            mark_running(&mut queue, &prompt_id);
            yield QueueEvent::PromptStarted { prompt_id: prompt_id.clone() };

            let mut spawn_opts = opts.clone();
            spawn_opts.cwd = Some(std::path::PathBuf::from(&queue.project_path));
            let mut images: Vec<std::path::PathBuf> =
                prompt.images.iter().map(std::path::PathBuf::from).collect();
            images.extend(opts.images.iter().cloned());
            spawn_opts.images = images;

            let exit_code = match supervisor.spawn_exec(&prompt.prompt, &spawn_opts).await {
                Ok(result) => result.exit_code,
                Err(err) => {
                    warn!(prompt_id = %prompt_id, %err, "queue prompt spawn failed");
                    1
                }
            };

            mark_finished(&mut queue, &prompt_id, exit_code);

            if let Err(err) = repo.save_queue(&queue).await {
                warn!(queue_id = %queue.id, %err, "failed to persist queue after prompt");
            }

            if exit_code == 0 {
                yield QueueEvent::PromptCompleted { prompt_id, exit_code };
            } else {
                yield QueueEvent::PromptFailed { prompt_id, exit_code };
            }
        }

        yield QueueEvent::QueueCompleted;
    }
}

fn mark_running(queue: &mut Queue, prompt_id: &str) {
    if let Some(prompt) = queue.prompts.iter_mut().find(|p| p.id == prompt_id) {
        prompt.status = PromptStatus::Running;
        prompt.started_at = Some(Utc::now());
    }
}

fn mark_finished(queue: &mut Queue, prompt_id: &str, exit_code: i32) {
    if let Some(prompt) = queue.prompts.iter_mut().find(|p: &&mut QueuedPrompt| p.id == prompt_id) {
        prompt.status = if exit_code == 0 {
            PromptStatus::Completed
        } else {
            PromptStatus::Failed
        };
        prompt.result = Some(PromptResult { exit_code });
        prompt.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_agent_core::PromptMode;
    use futures::StreamExt;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn queue_with(project_path: &str, prompts: &[&str]) -> Queue {
        let mut queue = Queue::new("q".to_string(), project_path.to_string());
        for p in prompts {
            queue
                .prompts
                .push(QueuedPrompt::new(p.to_string(), vec![], PromptMode::Auto));
        }
        queue
    }

    #[tokio::test]
    async fn paused_queue_stops_immediately_without_spawning() {
        let dir = tempdir().unwrap();
        let repo = Arc::new(QueueRepository::new(dir.path().join("queues.json")));
        let supervisor = Arc::new(Supervisor::new("/nonexistent/codex-test-binary"));
        let mut queue = queue_with(dir.path().to_str().unwrap(), &["a"]);
        queue.paused = true;

        let stream = run_queue(supervisor, repo, queue, SpawnOptions::default(), None);
        futures::pin_mut!(stream);
        let event = stream.next().await.unwrap();
        assert!(matches!(event, QueueEvent::QueueStopped { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn runs_every_prompt_in_order_and_persists_after_each() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "exit 0");
        let repo = Arc::new(QueueRepository::new(dir.path().join("queues.json")));
        let supervisor = Arc::new(Supervisor::new(script.display().to_string()));
        let queue = queue_with(dir.path().to_str().unwrap(), &["a", "b"]);
        let queue_id = queue.id.clone();

        let stream = run_queue(supervisor, Arc::clone(&repo), queue, SpawnOptions::default(), None);
        futures::pin_mut!(stream);

        let mut completed = 0;
        loop {
            match stream.next().await.unwrap() {
                QueueEvent::PromptCompleted { exit_code, .. } => {
                    assert_eq!(exit_code, 0);
                    completed += 1;
                }
                QueueEvent::QueueCompleted => break,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(completed, 2);

        let persisted = repo.get(&queue_id).await.unwrap();
        assert!(persisted.prompts.iter().all(|p| p.status == PromptStatus::Completed));
    }

    #[tokio::test]
    async fn stop_signal_halts_between_prompts_not_mid_prompt() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "exit 0");
        let repo = Arc::new(QueueRepository::new(dir.path().join("queues.json")));
        let supervisor = Arc::new(Supervisor::new(script.display().to_string()));
        let queue = queue_with(dir.path().to_str().unwrap(), &["a", "b", "c"]);
        let stop = StopSignal::new();

        let stream = run_queue(supervisor, repo, queue, SpawnOptions::default(), Some(stop.clone()));
        futures::pin_mut!(stream);

        // first prompt runs to completion
        let first = stream.next().await.unwrap();
        assert!(matches!(first, QueueEvent::PromptStarted { .. }));
        let completed = stream.next().await.unwrap();
        assert!(matches!(completed, QueueEvent::PromptCompleted { .. }));

        stop.stop();
        let event = stream.next().await.unwrap();
        assert!(matches!(event, QueueEvent::QueueStopped { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_marks_prompt_failed() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "tool", "exit 3");
        let repo = Arc::new(QueueRepository::new(dir.path().join("queues.json")));
        let supervisor = Arc::new(Supervisor::new(script.display().to_string()));
        let queue = queue_with(dir.path().to_str().unwrap(), &["a"]);

        let stream = run_queue(supervisor, repo, queue, SpawnOptions::default(), None);
        futures::pin_mut!(stream);

        stream.next().await; // started
        let event = stream.next().await.unwrap();
        assert!(matches!(event, QueueEvent::PromptFailed { exit_code: 3, .. }));
    }
}
