//! The rollout line data model: the closed tagged union of line variants,
//! their raw payload shapes, and the derived provenance classification.
//!
//! This module only defines the *shapes*. Parsing, normalization of the
//! alternate wire format, and provenance derivation live in
//! `codex-agent-rollout`, which depends on these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a rollout file's session originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Cli,
    Vscode,
    Exec,
    Unknown,
}

impl Default for SessionSource {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Session-level metadata, always the first record of a rollout file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub originator: String,
    #[serde(default = "default_cli_version")]
    pub cli_version: String,
    #[serde(default)]
    pub source: SessionSource,
}

fn default_cli_version() -> String {
    "unknown".to_string()
}

/// Git provenance captured alongside `session_meta`, when available.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
}

/// Payload carried by a `session_meta` line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetaPayload {
    pub meta: SessionMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
}

/// The closed set of line-level record kinds (§3). Implemented as a
/// tagged-union enum rather than dynamic dispatch, matching the sum-type
/// preference at this seam.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineKind {
    SessionMeta { payload: SessionMetaPayload },
    ResponseItem { payload: Value },
    EventMsg { payload: Value },
    TurnContext { payload: Value },
    Compacted { payload: Value },
}

impl LineKind {
    pub fn as_session_meta(&self) -> Option<&SessionMetaPayload> {
        match self {
            LineKind::SessionMeta { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            LineKind::SessionMeta { .. } => "session_meta",
            LineKind::ResponseItem { .. } => "response_item",
            LineKind::EventMsg { .. } => "event_msg",
            LineKind::TurnContext { .. } => "turn_context",
            LineKind::Compacted { .. } => "compacted",
        }
    }
}

/// Role a message is attributed to, once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Broad classification of where a line's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    UserInput,
    SystemInjected,
    ToolGenerated,
    FrameworkEvent,
}

/// Derived provenance, attached to every successfully-parsed line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub origin: Origin,
    pub display_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
}

impl Provenance {
    pub fn user_input() -> Self {
        Self {
            role: Some(Role::User),
            origin: Origin::UserInput,
            display_default: true,
            source_tag: None,
        }
    }

    pub fn system_injected(tag: &str) -> Self {
        Self {
            role: Some(Role::User),
            origin: Origin::SystemInjected,
            display_default: false,
            source_tag: Some(tag.to_string()),
        }
    }

    pub fn framework_event(tag: Option<&str>) -> Self {
        Self {
            role: None,
            origin: Origin::FrameworkEvent,
            display_default: false,
            source_tag: tag.map(str::to_string),
        }
    }

    pub fn tool_generated(role: Option<Role>) -> Self {
        Self {
            role,
            origin: Origin::ToolGenerated,
            display_default: true,
            source_tag: None,
        }
    }
}

/// A fully parsed, normalized rollout line with its derived provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: LineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

/// One entry of the changed-file summary derived from shell-command
/// heuristics applied to exec events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFileSummary {
    pub path: String,
    pub operation: FileOperation,
    pub change_count: u32,
    pub last_modified: DateTime<Utc>,
}
