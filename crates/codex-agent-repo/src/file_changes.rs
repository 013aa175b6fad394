//! The `file-changes-index.json` repository: a per-session cache of the
//! changed-file summaries derived from a rollout's exec events (§3), so
//! `GET /api/files/:id` and `GET /api/files/find?path=` don't have to
//! re-scan every rollout file on every request. `POST /api/files/rebuild`
//! clears and repopulates the whole cache; the scan itself is the
//! daemon's responsibility (it owns `codex-agent-session::FileChangeTracker`
//! and the rollout reader), this repository only stores the result.

use std::collections::HashMap;

use codex_agent_core::ChangedFileSummary;
use serde::{Deserialize, Serialize};

use crate::error::RepoError;
use crate::store::JsonStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChangeIndexDocument {
    #[serde(default)]
    sessions: HashMap<String, Vec<ChangedFileSummary>>,
}

pub struct FileChangeIndexRepository {
    store: JsonStore<FileChangeIndexDocument>,
}

impl FileChangeIndexRepository {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    pub async fn for_session(&self, session_id: &str) -> Vec<ChangedFileSummary> {
        self.store
            .load()
            .await
            .sessions
            .remove(session_id)
            .unwrap_or_default()
    }

    pub async fn find_path(&self, path: &str) -> Vec<(String, ChangedFileSummary)> {
        self.store
            .load()
            .await
            .sessions
            .into_iter()
            .filter_map(|(session_id, summaries)| {
                summaries
                    .into_iter()
                    .find(|s| s.path == path)
                    .map(|s| (session_id, s))
            })
            .collect()
    }

    pub async fn set_session(
        &self,
        session_id: &str,
        summaries: Vec<ChangedFileSummary>,
    ) -> Result<(), RepoError> {
        let mut doc = self.store.load().await;
        doc.sessions.insert(session_id.to_string(), summaries);
        self.store.save(&doc)
    }

    /// Replaces the entire index with freshly-scanned data.
    pub async fn rebuild(
        &self,
        sessions: HashMap<String, Vec<ChangedFileSummary>>,
    ) -> Result<(), RepoError> {
        self.store.save(&FileChangeIndexDocument { sessions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_agent_core::FileOperation;
    use tempfile::tempdir;

    fn summary(path: &str) -> ChangedFileSummary {
        ChangedFileSummary {
            path: path.to_string(),
            operation: FileOperation::Modified,
            change_count: 1,
            last_modified: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn set_and_fetch_per_session() {
        let dir = tempdir().unwrap();
        let repo = FileChangeIndexRepository::new(dir.path().join("file-changes-index.json"));
        repo.set_session("s1", vec![summary("a.rs")]).await.unwrap();

        let found = repo.for_session("s1").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "a.rs");
    }

    #[tokio::test]
    async fn find_path_scans_every_session() {
        let dir = tempdir().unwrap();
        let repo = FileChangeIndexRepository::new(dir.path().join("file-changes-index.json"));
        repo.set_session("s1", vec![summary("a.rs")]).await.unwrap();
        repo.set_session("s2", vec![summary("b.rs")]).await.unwrap();

        let hits = repo.find_path("b.rs").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "s2");
    }
}
