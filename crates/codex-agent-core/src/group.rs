//! Group record — a named set of session ids fanned out over one prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub paused: bool,
    pub session_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            paused: false,
            session_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a session id, preserving order and uniqueness.
    pub fn add_session(&mut self, session_id: String) {
        if !self.session_ids.contains(&session_id) {
            self.session_ids.push(session_id);
            self.updated_at = Utc::now();
        }
    }

    pub fn remove_session(&mut self, session_id: &str) -> bool {
        let before = self.session_ids.len();
        self.session_ids.retain(|id| id != session_id);
        let removed = self.session_ids.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }
}
