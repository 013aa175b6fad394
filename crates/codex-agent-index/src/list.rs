//! Two-tier session lookup (§4.4): try the SQLite `threads` table first,
//! fall back to a full filesystem scan on any absence or failure. The
//! scan tier applies filter/sort/paginate in memory since it has no
//! query engine to push those down into.

use std::path::Path;

use codex_agent_core::{ListSessionsOptions, SessionListPage, SessionRecord, SortBy, SortOrder};
use tracing::warn;

use crate::scan::{scan_sessions, scan_single_session};
use crate::sqlite::{self, SqliteListOptions};

fn scan_opts_to_sqlite<'a>(opts: &'a ListSessionsOptions) -> SqliteListOptions<'a> {
    SqliteListOptions {
        source: opts.source.as_ref().map(|s| match s {
            codex_agent_core::SessionSource::Cli => "cli",
            codex_agent_core::SessionSource::Vscode => "vscode",
            codex_agent_core::SessionSource::Exec => "exec",
            codex_agent_core::SessionSource::Unknown => "unknown",
        }),
        cwd: opts.cwd.as_deref(),
        git_branch: opts.git_branch.as_deref(),
        sort_by: opts.sort_by,
        sort_order: opts.sort_order,
        limit: opts.effective_limit(),
        offset: opts.effective_offset(),
    }
}

fn matches_filters(record: &SessionRecord, opts: &ListSessionsOptions) -> bool {
    if let Some(source) = &opts.source {
        if &record.source != source {
            return false;
        }
    }
    if let Some(cwd) = &opts.cwd {
        if &record.cwd != cwd {
            return false;
        }
    }
    if let Some(branch) = &opts.git_branch {
        let record_branch = record.git.as_ref().and_then(|g| g.branch.as_deref());
        if record_branch != Some(branch.as_str()) {
            return false;
        }
    }
    true
}

fn sort_records(records: &mut [SessionRecord], sort_by: SortBy, sort_order: SortOrder) {
    records.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// List sessions matching `opts`, preferring the SQLite index and
/// falling back to a filesystem scan of `home` whenever the index is
/// missing, schema-mismatched, or errors out.
pub async fn list_sessions(home: &Path, opts: &ListSessionsOptions) -> SessionListPage {
    let sqlite_opts = scan_opts_to_sqlite(opts);
    if let Some(result) = sqlite::list_sessions(home, &sqlite_opts) {
        match result {
            Ok((sessions, total)) => {
                return SessionListPage {
                    sessions,
                    total,
                    offset: opts.effective_offset(),
                    limit: opts.effective_limit(),
                };
            }
            Err(err) => {
                warn!("sqlite session index query failed, falling back to scan: {err}");
            }
        }
    }

    let mut records = scan_sessions(home).await;
    records.retain(|record| matches_filters(record, opts));
    sort_records(&mut records, opts.sort_by, opts.sort_order);

    let total = records.len();
    let offset = opts.effective_offset();
    let limit = opts.effective_limit();
    let sessions = records.into_iter().skip(offset).take(limit).collect();

    SessionListPage {
        sessions,
        total,
        offset,
        limit,
    }
}

/// Find a single session by id, preferring the SQLite index.
pub async fn find_session(home: &Path, id: &str) -> Option<SessionRecord> {
    if let Some(result) = sqlite::find_session(home, id) {
        match result {
            Ok(Some(record)) => return Some(record),
            Ok(None) => {}
            Err(err) => warn!("sqlite session lookup failed, falling back to scan: {err}"),
        }
    }
    scan_single_session(home, id).await
}

/// Find the most recently updated session, optionally restricted to a
/// working directory — used to resolve "resume the last session" with
/// no explicit id.
pub async fn find_latest_session(home: &Path, cwd: Option<&str>) -> Option<SessionRecord> {
    let opts = ListSessionsOptions {
        cwd: cwd.map(str::to_string),
        sort_by: SortBy::UpdatedAt,
        sort_order: SortOrder::Desc,
        limit: Some(1),
        ..Default::default()
    };
    list_sessions(home, &opts).await.sessions.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    fn meta_line(id: &str, cwd: &str) -> String {
        format!(
            r#"{{"timestamp":"2026-01-01T00:00:00Z","type":"session_meta","payload":{{"id":"{id}","timestamp":"2026-01-01T00:00:00Z","cwd":"{cwd}","originator":"cli","cli_version":"1.0.0","source":"cli"}}}}"#
        )
    }

    async fn write_session(dir: &Path, id: &str, cwd: &str) {
        fs::create_dir_all(dir).await.unwrap();
        let path = dir.join(format!("rollout-{id}.jsonl"));
        fs::write(&path, format!("{}\n", meta_line(id, cwd)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_sessions_falls_back_to_scan_without_sqlite_state() {
        let home = tempfile::tempdir().unwrap();
        write_session(&home.path().join("sessions/2026/01/01"), "one", "/work").await;
        write_session(&home.path().join("sessions/2026/01/02"), "two", "/work").await;

        let page = list_sessions(home.path(), &ListSessionsOptions::default()).await;
        assert_eq!(page.total, 2);
        assert_eq!(page.sessions.len(), 2);
        assert_eq!(page.sessions[0].id, "two");
    }

    #[tokio::test]
    async fn list_sessions_filters_by_cwd() {
        let home = tempfile::tempdir().unwrap();
        write_session(&home.path().join("sessions/2026/01/01"), "a", "/work/one").await;
        write_session(&home.path().join("sessions/2026/01/02"), "b", "/work/two").await;

        let opts = ListSessionsOptions {
            cwd: Some("/work/two".to_string()),
            ..Default::default()
        };
        let page = list_sessions(home.path(), &opts).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.sessions[0].id, "b");
    }

    #[tokio::test]
    async fn list_sessions_paginates() {
        let home = tempfile::tempdir().unwrap();
        for (idx, id) in ["a", "b", "c"].iter().enumerate() {
            write_session(
                &home.path().join(format!("sessions/2026/01/{:02}", idx + 1)),
                id,
                "/work",
            )
            .await;
        }

        let opts = ListSessionsOptions {
            limit: Some(1),
            offset: Some(1),
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let page = list_sessions(home.path(), &opts).await;
        assert_eq!(page.total, 3);
        assert_eq!(page.sessions.len(), 1);
        assert_eq!(page.sessions[0].id, "b");
    }

    #[tokio::test]
    async fn find_session_locates_by_id_and_returns_none_for_missing() {
        let home = tempfile::tempdir().unwrap();
        write_session(&home.path().join("sessions/2026/01/01"), "findme", "/work").await;

        assert!(find_session(home.path(), "findme").await.is_some());
        assert!(find_session(home.path(), "nope").await.is_none());
    }

    #[tokio::test]
    async fn find_latest_session_picks_most_recently_updated_in_cwd() {
        let home = tempfile::tempdir().unwrap();
        write_session(&home.path().join("sessions/2026/01/01"), "first", "/work").await;
        write_session(&home.path().join("sessions/2026/02/01"), "second", "/other").await;
        write_session(&home.path().join("sessions/2026/03/01"), "third", "/work").await;

        let latest = find_latest_session(home.path(), Some("/work")).await;
        assert_eq!(latest.unwrap().id, "third");
    }
}
