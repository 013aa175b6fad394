//! Session record — the listing view over a rollout file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::rollout::{GitInfo, SessionSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub rollout_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: SessionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    pub cwd: String,
    pub cli_version: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forked_from_id: Option<String>,
}

impl SessionRecord {
    /// `title` falls back to the first user message, then the id, per §3.
    pub fn resolve_title(id: &str, first_user_message: Option<&str>) -> String {
        first_user_message
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    CreatedAt,
    UpdatedAt,
}

impl Default for SortBy {
    fn default() -> Self {
        Self::CreatedAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Desc
    }
}

/// Filter/sort/paginate options shared by every `list_sessions` backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSessionsOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SessionSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

pub const DEFAULT_LIMIT: usize = 50;
pub const DEFAULT_OFFSET: usize = 0;

impl ListSessionsOptions {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(DEFAULT_OFFSET)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListPage {
    pub sessions: Vec<SessionRecord>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}
