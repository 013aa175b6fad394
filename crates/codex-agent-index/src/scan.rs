//! Filesystem-scan fallback: rebuild session records directly from the
//! rollout files on disk, used whenever the SQLite tier is unavailable
//! or untrustworthy.
//!
//! Walks `${home}/sessions/YYYY/MM/DD/rollout-*.jsonl` (descending by
//! date directory, then by filename) followed by the flat
//! `${home}/archived_sessions/rollout-*.jsonl`, matching §4.4's ordering.

use std::path::{Path, PathBuf};

use codex_agent_core::SessionRecord;
use codex_agent_rollout::{extract_first_user_message, parse_session_meta};
use tracing::warn;

const SESSION_FILE_PREFIX: &str = "rollout-";
const SESSION_FILE_SUFFIX: &str = ".jsonl";
const ARCHIVED_DIR_NAME: &str = "archived_sessions";
const SESSIONS_DIR_NAME: &str = "sessions";

fn is_session_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(SESSION_FILE_PREFIX) && name.ends_with(SESSION_FILE_SUFFIX))
        .unwrap_or(false)
}

/// List rollout file paths directly under `dir`, sorted by filename
/// descending (newest session id lexically last wins ties).
async fn session_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if is_session_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    files
}

/// Sorted (descending) list of numeric-named subdirectories of `dir`
/// (used for the `YYYY`, `MM`, `DD` levels).
async fn numeric_subdirs_desc(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut dirs = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_numeric_dir = path.is_dir()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false);
        if is_numeric_dir {
            dirs.push(path);
        }
    }
    dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    dirs
}

/// Walk `${home}/sessions/YYYY/MM/DD/rollout-*.jsonl`, newest date first.
async fn walk_active_sessions(home: &Path) -> Vec<PathBuf> {
    let sessions_dir = home.join(SESSIONS_DIR_NAME);
    let mut files = Vec::new();
    for year in numeric_subdirs_desc(&sessions_dir).await {
        for month in numeric_subdirs_desc(&year).await {
            for day in numeric_subdirs_desc(&month).await {
                files.extend(session_files_in(&day).await);
            }
        }
    }
    files
}

async fn walk_archived_sessions(home: &Path) -> Vec<PathBuf> {
    session_files_in(&home.join(ARCHIVED_DIR_NAME)).await
}

/// Scan every rollout file under `home` — active sessions first (newest
/// date first), then archived sessions — building a `SessionRecord` for
/// each by reading only its first line plus a first-user-message pass.
pub async fn scan_sessions(home: &Path) -> Vec<SessionRecord> {
    let mut records = Vec::new();
    let archived_dir = home.join(ARCHIVED_DIR_NAME);

    for path in walk_active_sessions(home).await {
        if let Some(record) = build_record(&path, &archived_dir).await {
            records.push(record);
        }
    }
    for path in walk_archived_sessions(home).await {
        if let Some(record) = build_record(&path, &archived_dir).await {
            records.push(record);
        }
    }
    records
}

async fn build_record(path: &Path, archived_dir: &Path) -> Option<SessionRecord> {
    let payload = match parse_session_meta(path).await {
        Ok(payload) => payload,
        Err(err) => {
            warn!(path = %path.display(), "skipping rollout file with no session metadata: {err}");
            return None;
        }
    };
    let first_user_message = extract_first_user_message(path).await.ok().flatten();
    let metadata = tokio::fs::metadata(path).await.ok();
    let updated_at = metadata
        .and_then(|m| m.modified().ok())
        .map(chrono::DateTime::<chrono::Utc>::from)
        .unwrap_or(payload.meta.timestamp);
    let archived_at = path.starts_with(archived_dir).then_some(updated_at);

    Some(SessionRecord {
        title: SessionRecord::resolve_title(&payload.meta.id, first_user_message.as_deref()),
        id: payload.meta.id,
        rollout_path: path.to_path_buf(),
        created_at: payload.meta.timestamp,
        updated_at,
        source: payload.meta.source,
        model_provider: None,
        cwd: payload.meta.cwd,
        cli_version: payload.meta.cli_version,
        first_user_message,
        archived_at,
        git: payload.git,
        forked_from_id: None,
    })
}

pub async fn scan_single_session(home: &Path, id: &str) -> Option<SessionRecord> {
    scan_sessions(home).await.into_iter().find(|record| record.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    fn meta_line(id: &str) -> String {
        format!(
            r#"{{"timestamp":"2026-01-01T00:00:00Z","type":"session_meta","payload":{{"id":"{id}","timestamp":"2026-01-01T00:00:00Z","cwd":"/work","originator":"cli","cli_version":"1.0.0","source":"cli"}}}}"#
        )
    }

    fn user_line() -> &'static str {
        r#"{"timestamp":"2026-01-01T00:00:01Z","type":"response_item","payload":{"type":"message","role":"user","content":[{"type":"input_text","text":"hello there"}]}}"#
    }

    async fn write_session(dir: &Path, id: &str) {
        fs::create_dir_all(dir).await.unwrap();
        let path = dir.join(format!("rollout-{id}.jsonl"));
        fs::write(&path, format!("{}\n{}\n", meta_line(id), user_line()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn scan_sessions_walks_nested_date_dirs_newest_first() {
        let home = tempfile::tempdir().unwrap();
        write_session(&home.path().join("sessions/2026/01/01"), "older").await;
        write_session(&home.path().join("sessions/2026/02/15"), "newer").await;

        let records = scan_sessions(home.path()).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "newer");
        assert_eq!(records[1].id, "older");
        assert!(records.iter().all(|r| r.archived_at.is_none()));
    }

    #[tokio::test]
    async fn scan_sessions_lists_archived_after_active_with_archived_at_set() {
        let home = tempfile::tempdir().unwrap();
        write_session(&home.path().join("sessions/2026/01/01"), "active").await;
        write_session(&home.path().join("archived_sessions"), "archived").await;

        let records = scan_sessions(home.path()).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "active");
        assert!(records[0].archived_at.is_none());
        assert_eq!(records[1].id, "archived");
        assert!(records[1].archived_at.is_some());
    }

    #[tokio::test]
    async fn scan_sessions_skips_files_missing_session_meta() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join("sessions/2026/01/01");
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("rollout-bad.jsonl"), "not json\n")
            .await
            .unwrap();

        let records = scan_sessions(home.path()).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn scan_single_session_finds_by_id() {
        let home = tempfile::tempdir().unwrap();
        write_session(&home.path().join("sessions/2026/03/03"), "target").await;

        let found = scan_single_session(home.path(), "target").await;
        assert!(found.is_some());
        assert_eq!(found.unwrap().first_user_message.as_deref(), Some("hello there"));

        assert!(scan_single_session(home.path(), "missing").await.is_none());
    }
}
