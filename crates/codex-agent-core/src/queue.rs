//! Queue record — a named sequence of prompts executed serially.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    Auto,
    Manual,
}

impl Default for PromptMode {
    fn default() -> Self {
        Self::Auto
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    pub exit_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedPrompt {
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub status: PromptStatus,
    #[serde(default)]
    pub mode: PromptMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PromptResult>,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueuedPrompt {
    pub fn new(prompt: String, images: Vec<String>, mode: PromptMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt,
            images,
            status: PromptStatus::Pending,
            mode,
            result: None,
            added_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    pub id: String,
    pub name: String,
    pub project_path: String,
    #[serde(default)]
    pub paused: bool,
    pub prompts: Vec<QueuedPrompt>,
    pub created_at: DateTime<Utc>,
}

impl Queue {
    pub fn new(name: String, project_path: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            project_path,
            paused: false,
            prompts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// The prompt currently `running`, if any — there is at most one per
    /// the invariant in §3.
    pub fn running_prompt(&self) -> Option<&QueuedPrompt> {
        self.prompts.iter().find(|p| p.status == PromptStatus::Running)
    }

    pub fn next_pending_index(&self) -> Option<usize> {
        self.prompts
            .iter()
            .position(|p| p.status == PromptStatus::Pending)
    }
}
