//! Request/response bodies for the REST surface (§6). Kept separate
//! from the domain types in `codex-agent-core` since these shapes are
//! wire-only (optional fields, camelCase-free snake_case query params).

use serde::{Deserialize, Serialize};

use codex_agent_core::{PromptMode, SessionSource};

#[derive(Debug, Deserialize, Default)]
pub struct ListSessionsQuery {
    pub source: Option<SessionSource>,
    pub cwd: Option<String>,
    pub branch: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddGroupSessionBody {
    pub session_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct RunPromptBody {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub full_auto: bool,
    #[serde(default)]
    pub sandbox: Option<String>,
    #[serde(default)]
    pub ask_for_approval: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQueueBody {
    pub name: String,
    pub project_path: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPromptBody {
    pub prompt: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub mode: PromptMode,
}

#[derive(Debug, Deserialize)]
pub struct PatchPromptBody {
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovePromptBody {
    pub queue_id: String,
    pub command_id: String,
    pub new_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SetPromptModeBody {
    pub mode: PromptMode,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookmarkBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub session_id: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub from_message_id: Option<String>,
    #[serde(default)]
    pub to_message_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenBody {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedTokenResponse {
    pub token: codex_agent_core::TokenRecord,
    pub wire_token: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct FindFileQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FileChangeHit {
    pub session_id: String,
    #[serde(flatten)]
    pub summary: codex_agent_core::ChangedFileSummary,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub pid: u32,
    pub port: u16,
    pub host: String,
    pub mode: codex_agent_core::DaemonMode,
    pub uptime_secs: u64,
}
