//! `/ws` (§6): `subscribe_session`/`unsubscribe_session`/
//! `subscribe_new_sessions` in, `session_event`/`new_session`/
//! `subscribed`/`error` out. Each connection splits into a receive loop
//! and a `write_outbound` task fed by an `mpsc::channel`, so a slow
//! client write never blocks the subscription state machine. One
//! connection can hold any number of per-session subscriptions plus the
//! global new-session broadcast.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use codex_agent_rollout::{read_all, RolloutEvent, RolloutWatcher};
use codex_agent_session::{Chunk, Normalizer, StartedMode};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info_span, Instrument};

use crate::auth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    SubscribeSession { session_id: String },
    UnsubscribeSession { session_id: String },
    SubscribeNewSessions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    SessionEvent { session_id: String, event: serde_json::Value },
    NewSession { path: String },
    Subscribed { channel: String },
    Error { message: String },
}

/// Process-wide watcher/broadcast state, owned for the daemon's
/// lifetime (§9).
pub struct WsHub {
    new_sessions: broadcast::Sender<PathBuf>,
    directory_watcher: RwLock<Option<RolloutWatcher>>,
    next_conn_id: AtomicU64,
}

impl WsHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            new_sessions: tx,
            directory_watcher: RwLock::new(None),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Starts (once) a directory watcher over `home`'s session root,
    /// fanning `NewSessionFile` events into the shared broadcast channel
    /// that every `subscribe_new_sessions` connection listens to.
    async fn ensure_directory_watch(&self, home: &std::path::Path) {
        let mut guard = self.directory_watcher.write().await;
        if guard.is_some() {
            return;
        }
        let Ok((watcher, mut events)) = RolloutWatcher::spawn() else {
            return;
        };
        if watcher.watch_directory(home).is_err() {
            return;
        }
        let tx = self.new_sessions.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let RolloutEvent::NewSessionFile { path } = event {
                    let _ = tx.send(path);
                }
            }
        });
        *guard = Some(watcher);
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if auth::authenticate(&state, &headers).await.is_err() {
        return axum::http::StatusCode::UNAUTHORIZED.into_response();
    }
    let conn_id = state.ws.next_conn_id.fetch_add(1, Ordering::Relaxed);
    ws.on_upgrade(move |socket| {
        let span = info_span!("ws_conn", conn_id);
        handle_socket(socket, state).instrument(span)
    })
    .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    debug!("websocket connection established");
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<String>(64);
    let mut session_tasks: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();
    let mut new_session_task: Option<tokio::task::JoinHandle<()>> = None;
    let writer_task = tokio::spawn(write_outbound(ws_sender, rx));

    while let Some(inbound) = ws_receiver.next().await {
        let text = match inbound {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => continue,
        };

        let parsed: Result<ClientMessage, _> = serde_json::from_str(&text);
        let outgoing = match parsed {
            Ok(ClientMessage::SubscribeSession { session_id }) => {
                if !session_tasks.contains_key(&session_id) {
                    let task = spawn_session_follower(Arc::clone(&state), session_id.clone(), tx.clone());
                    session_tasks.insert(session_id.clone(), task);
                }
                Some(ServerMessage::Subscribed { channel: format!("session:{session_id}") })
            }
            Ok(ClientMessage::UnsubscribeSession { session_id }) => {
                if let Some(task) = session_tasks.remove(&session_id) {
                    task.abort();
                }
                Some(ServerMessage::Subscribed { channel: format!("unsubscribed:{session_id}") })
            }
            Ok(ClientMessage::SubscribeNewSessions) => {
                state.ws.ensure_directory_watch(&state.home).await;
                if new_session_task.is_none() {
                    new_session_task = Some(spawn_new_session_forwarder(Arc::clone(&state), tx.clone()));
                }
                Some(ServerMessage::Subscribed { channel: "new_sessions".to_string() })
            }
            Err(err) => Some(ServerMessage::Error { message: format!("invalid message: {err}") }),
        };

        if let Some(message) = outgoing {
            if tx.send(serialize(&message)).await.is_err() {
                break;
            }
        }
        session_tasks.retain(|_, task| !task.is_finished());
    }

    drop(tx);
    for (_, task) in session_tasks {
        task.abort();
    }
    if let Some(task) = new_session_task {
        task.abort();
    }
    let _ = writer_task.await;
    debug!("websocket connection closed");
}

fn spawn_new_session_forwarder(
    state: Arc<AppState>,
    tx: mpsc::Sender<String>,
) -> tokio::task::JoinHandle<()> {
    let mut rx = state.ws.new_sessions.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(path) => {
                    let message = ServerMessage::NewSession { path: path.display().to_string() };
                    if tx.send(serialize(&message)).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
}

/// Replays a session's existing rollout lines through the normalizer,
/// then tails the file for appended lines, forwarding every normalized
/// event as a `session_event` frame.
fn spawn_session_follower(
    state: Arc<AppState>,
    session_id: String,
    tx: mpsc::Sender<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Some(record) = codex_agent_index::find_session(&state.home, &session_id).await else {
            let message = ServerMessage::Error { message: format!("session '{session_id}' not found") };
            let _ = tx.send(serialize(&message)).await;
            return;
        };

        let mut normalizer = Normalizer::new(StartedMode::Bare);
        if let Ok(lines) = read_all(&record.rollout_path).await {
            for line in lines {
                for event in normalizer.process(&session_id, &Chunk::Line(line)) {
                    if send_event(&tx, &session_id, &event).await.is_err() {
                        return;
                    }
                }
            }
        }

        let Ok((watcher, mut events)) = RolloutWatcher::spawn() else { return };
        if watcher.watch_file(&record.rollout_path).is_err() {
            return;
        }

        while let Some(event) = events.recv().await {
            match event {
                RolloutEvent::Appended { lines, .. } => {
                    for line in lines {
                        for normalized in normalizer.process(&session_id, &Chunk::Line(line)) {
                            if send_event(&tx, &session_id, &normalized).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                RolloutEvent::ReadError { message, .. } => {
                    let error = ServerMessage::Error { message };
                    if tx.send(serialize(&error)).await.is_err() {
                        return;
                    }
                }
                RolloutEvent::NewSessionFile { .. } => {}
            }
        }
    })
}

async fn send_event(
    tx: &mpsc::Sender<String>,
    session_id: &str,
    event: &codex_agent_session::NormalizedEvent,
) -> Result<(), mpsc::error::SendError<String>> {
    let message = ServerMessage::SessionEvent {
        session_id: session_id.to_string(),
        event: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
    };
    tx.send(serialize(&message)).await
}

async fn write_outbound(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(message) = rx.recv().await {
        if ws_sender.send(Message::text(message)).await.is_err() {
            break;
        }
    }
}

fn serialize(message: &ServerMessage) -> String {
    serde_json::to_string(message)
        .unwrap_or_else(|_| r#"{"type":"error","message":"internal serialization error"}"#.to_string())
}
