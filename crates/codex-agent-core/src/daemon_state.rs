//! The daemon pid-file record (§6, §3 supplemental).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DaemonMode {
    Http,
    AppServer,
}

impl Default for DaemonMode {
    fn default() -> Self {
        Self::Http
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonPidFile {
    pub pid: u32,
    pub port: u16,
    #[serde(default)]
    pub host: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub mode: DaemonMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonStatusKind {
    Running,
    Stale,
    Stopped,
}
