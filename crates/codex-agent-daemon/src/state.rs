//! Daemon-wide shared state (§9: "the WebSocket manager holds
//! process-wide watcher state tied to the daemon's lifetime"). Holds
//! every repository, the auth manager, and the process supervisor this
//! daemon fronts, behind a single `Arc` cloned into each handler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use codex_agent_auth::AuthManager;
use codex_agent_core::DaemonMode;
use codex_agent_dispatch::StopSignal;
use codex_agent_repo::{BookmarkRepository, FileChangeIndexRepository, GroupRepository, QueueRepository, TokenRepository};
use codex_agent_supervisor::Supervisor;
use tokio::sync::RwLock as AsyncRwLock;

use crate::ws::WsHub;

/// Everything needed to build an `AppState`: where config and rollouts
/// live, how to authenticate, and which tool binary to invoke.
pub struct DaemonConfig {
    pub config_dir: PathBuf,
    pub home: PathBuf,
    pub host: String,
    pub port: u16,
    pub static_token: Option<String>,
    pub binary: String,
    pub mode: DaemonMode,
}

pub struct AppState {
    pub config_dir: PathBuf,
    pub home: PathBuf,
    pub groups: Arc<GroupRepository>,
    pub queues: Arc<QueueRepository>,
    pub bookmarks: Arc<BookmarkRepository>,
    pub file_changes: Arc<FileChangeIndexRepository>,
    pub auth: Arc<AuthManager>,
    pub static_token: Option<String>,
    pub supervisor: Arc<Supervisor>,
    pub ws: Arc<WsHub>,
    /// Stop signals for in-flight `run_queue` streams, keyed by queue id,
    /// so `POST /api/queues/:id/stop` can reach a running fan-out.
    pub running_queues: Arc<AsyncRwLock<HashMap<String, StopSignal>>>,
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    pub mode: DaemonMode,
}

impl AppState {
    pub fn new(config: DaemonConfig) -> Arc<Self> {
        let tokens = TokenRepository::new(config.config_dir.join("tokens.json"));
        let auth = Arc::new(AuthManager::new(tokens, config.static_token.clone()));
        Arc::new(Self {
            groups: Arc::new(GroupRepository::new(config.config_dir.join("groups.json"))),
            queues: Arc::new(QueueRepository::new(config.config_dir.join("queues.json"))),
            bookmarks: Arc::new(BookmarkRepository::new(config.config_dir.join("bookmarks.json"))),
            file_changes: Arc::new(FileChangeIndexRepository::new(
                config.config_dir.join("file-changes-index.json"),
            )),
            auth,
            static_token: config.static_token,
            supervisor: Arc::new(Supervisor::new(config.binary)),
            ws: Arc::new(WsHub::new()),
            running_queues: Arc::new(AsyncRwLock::new(HashMap::new())),
            start_time: Instant::now(),
            port: config.port,
            host: config.host,
            mode: config.mode,
            config_dir: config.config_dir,
            home: config.home,
        })
    }
}
