//! The running session's output stream: an `mpsc` channel wrapped as a
//! `futures::Stream`, the same split used by the sibling agent crate's
//! event stream — a queue plus a wake is exactly what an async channel
//! already gives you.

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::mpsc;

use crate::chunk::Chunk;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionStats {
    pub success: bool,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub message_count: u64,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session's real id was resolved (a placeholder was adopted,
    /// or reconciliation confirmed a caller-supplied id).
    SessionId { session_id: String },
    /// A chunk enqueued by `push_line` — a whole line, or (under
    /// char-granularity streaming) one code point of assistant text.
    Message(Chunk),
    /// Terminal: no further events follow.
    Complete(CompletionStats),
}

pub struct SessionEvents {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { receiver }
    }
}

impl Stream for SessionEvents {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}
