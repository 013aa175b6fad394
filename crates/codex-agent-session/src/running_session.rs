//! `RunningSession` (§4.6): fuses a supervised subprocess with a rollout
//! tailer into one ordered stream of chunks, with optional char-level
//! streaming and session-id reconciliation. Cancellation is a flag plus
//! an optional stop-hook; the event stream is a channel-backed async
//! iterator behind a single-slot waiter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use codex_agent_supervisor::{Supervisor, SupervisorError};
use tokio::sync::mpsc;
use tracing::debug;

use crate::chunk::{assistant_text, CharChunk, Chunk};
use crate::events::{CompletionStats, SessionEvent, SessionEvents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamGranularity {
    Event,
    Char,
}

impl Default for StreamGranularity {
    fn default() -> Self {
        Self::Event
    }
}

type StopHook = Box<dyn FnOnce() + Send>;

/// A session currently backed by a live (or just-exited) subprocess.
pub struct RunningSession {
    session_id: RwLock<String>,
    allow_session_id_update: AtomicBool,
    message_count: AtomicU64,
    completed: AtomicBool,
    started_at: chrono::DateTime<Utc>,
    granularity: StreamGranularity,
    events_tx: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    supervisor: Arc<Supervisor>,
    process_id: String,
    stop_hook: Mutex<Option<StopHook>>,
}

impl RunningSession {
    pub fn new(
        session_id: impl Into<String>,
        allow_session_id_update: bool,
        granularity: StreamGranularity,
        supervisor: Arc<Supervisor>,
        process_id: impl Into<String>,
        stop_hook: Option<StopHook>,
    ) -> (Arc<Self>, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            session_id: RwLock::new(session_id.into()),
            allow_session_id_update: AtomicBool::new(allow_session_id_update),
            message_count: AtomicU64::new(0),
            completed: AtomicBool::new(false),
            started_at: Utc::now(),
            granularity,
            events_tx: Mutex::new(Some(tx)),
            supervisor,
            process_id: process_id.into(),
            stop_hook: Mutex::new(stop_hook),
        });
        (session, SessionEvents::new(rx))
    }

    pub fn session_id(&self) -> String {
        self.session_id.read().unwrap().clone()
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    fn send(&self, event: SessionEvent) {
        let guard = self.events_tx.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Per §4.6's `pushLine`: reconciles the session id (if this session
    /// still allows adoption), counts the message, then enqueues either
    /// the whole line or — under char streaming, for assistant text — a
    /// `CharChunk` per code point.
    pub fn push_line(&self, line: codex_agent_core::Line) {
        if self.allow_session_id_update.load(Ordering::SeqCst) {
            if let Some(payload) = line.kind.as_session_meta() {
                let new_id = payload.meta.id.clone();
                let changed = {
                    let mut guard = self.session_id.write().unwrap();
                    if *guard != new_id {
                        *guard = new_id.clone();
                        true
                    } else {
                        false
                    }
                };
                if changed {
                    self.send(SessionEvent::SessionId { session_id: new_id });
                }
            }
        }

        self.message_count.fetch_add(1, Ordering::SeqCst);

        if self.granularity == StreamGranularity::Char {
            if let Some(text) = assistant_text(&line) {
                let session_id = self.session_id();
                for ch in text.chars() {
                    self.send(SessionEvent::Message(Chunk::Char(CharChunk {
                        ch,
                        session_id: session_id.clone(),
                        timestamp: Utc::now(),
                        source: line.clone(),
                    })));
                }
                return;
            }
        }

        self.send(SessionEvent::Message(Chunk::Line(line)));
    }

    /// Idempotent. Builds the completion stats, emits `Complete`, then
    /// drops the sender so `messages()` ends once the queue drains.
    pub fn finish(&self, exit_code: i32) {
        if self.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        let stats = CompletionStats {
            success: exit_code == 0,
            exit_code,
            started_at: self.started_at,
            completed_at: Utc::now(),
            message_count: self.message_count(),
        };
        self.send(SessionEvent::Complete(stats));
        self.events_tx.lock().unwrap().take();
    }

    /// Runs the stop hook (if any), then kills the backing process.
    pub async fn cancel(&self) -> Result<(), SupervisorError> {
        if let Some(hook) = self.stop_hook.lock().unwrap().take() {
            hook();
        }
        self.supervisor.kill(&self.process_id).await
    }

    /// Writes ETX (`\x03`) to the process's stdin.
    pub async fn interrupt(&self) -> Result<(), SupervisorError> {
        debug!(session_id = %self.session_id(), "interrupting running session");
        self.supervisor.write_input(&self.process_id, "\u{3}").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_agent_core::{Line, LineKind, Provenance, SessionMeta, SessionMetaPayload, SessionSource};
    use futures::StreamExt;
    use serde_json::json;

    fn meta_line(id: &str) -> Line {
        Line {
            timestamp: Utc::now(),
            kind: LineKind::SessionMeta {
                payload: SessionMetaPayload {
                    meta: SessionMeta {
                        id: id.to_string(),
                        timestamp: Utc::now(),
                        cwd: "/work".to_string(),
                        originator: "cli".to_string(),
                        cli_version: "1.0.0".to_string(),
                        source: SessionSource::Cli,
                    },
                    git: None,
                },
            },
            provenance: None,
        }
    }

    fn agent_message(text: &str) -> Line {
        Line {
            timestamp: Utc::now(),
            kind: LineKind::EventMsg {
                payload: json!({"type": "AgentMessage", "message": text}),
            },
            provenance: Some(Provenance::tool_generated(None)),
        }
    }

    #[tokio::test]
    async fn adopts_session_id_once_when_allowed() {
        let (session, mut events) = RunningSession::new(
            "pending-1",
            true,
            StreamGranularity::Event,
            Arc::new(Supervisor::default()),
            "proc-1",
            None,
        );

        session.push_line(meta_line("real-id"));
        let event = events.next().await.unwrap();
        assert!(matches!(event, SessionEvent::SessionId { session_id } if session_id == "real-id"));
        assert_eq!(session.session_id(), "real-id");

        let message_event = events.next().await.unwrap();
        assert!(matches!(message_event, SessionEvent::Message(Chunk::Line(_))));
    }

    #[tokio::test]
    async fn resumed_session_never_adopts_a_new_id() {
        let (session, mut events) = RunningSession::new(
            "caller-id",
            false,
            StreamGranularity::Event,
            Arc::new(Supervisor::default()),
            "proc-1",
            None,
        );

        session.push_line(meta_line("other-id"));
        let event = events.next().await.unwrap();
        assert!(matches!(event, SessionEvent::Message(Chunk::Line(_))));
        assert_eq!(session.session_id(), "caller-id");
    }

    #[tokio::test]
    async fn char_granularity_splits_assistant_text_into_code_points() {
        let (session, mut events) = RunningSession::new(
            "s1",
            false,
            StreamGranularity::Char,
            Arc::new(Supervisor::default()),
            "proc-1",
            None,
        );

        session.push_line(agent_message("hi"));
        for expected in ['h', 'i'] {
            let event = events.next().await.unwrap();
            match event {
                SessionEvent::Message(Chunk::Char(c)) => assert_eq!(c.ch, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(session.message_count(), 1);
    }

    #[tokio::test]
    async fn finish_is_idempotent_and_closes_the_stream() {
        let (session, mut events) = RunningSession::new(
            "s1",
            false,
            StreamGranularity::Event,
            Arc::new(Supervisor::default()),
            "proc-1",
            None,
        );

        session.finish(0);
        session.finish(1);

        let event = events.next().await.unwrap();
        match event {
            SessionEvent::Complete(stats) => {
                assert!(stats.success);
                assert_eq!(stats.exit_code, 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn cancel_runs_the_stop_hook_once() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();
        let (session, _events) = RunningSession::new(
            "s1",
            false,
            StreamGranularity::Event,
            Arc::new(Supervisor::default()),
            "proc-missing",
            Some(Box::new(move || {
                called_clone.store(true, Ordering::SeqCst);
            })),
        );

        let _ = session.cancel().await;
        assert!(called.load(Ordering::SeqCst));
    }
}
