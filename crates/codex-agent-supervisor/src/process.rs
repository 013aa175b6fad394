//! The tracked-subprocess record (§4.5) and its status lifecycle.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Exited,
    Killed,
}

/// A snapshot of a tracked subprocess, safe to hand out to callers —
/// holds no process handle of its own.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub id: String,
    pub pid: Option<u32>,
    pub command: String,
    pub prompt: Option<String>,
    pub started_at: DateTime<Utc>,
    pub status: ProcessStatus,
    pub exit_code: Option<i32>,
}
