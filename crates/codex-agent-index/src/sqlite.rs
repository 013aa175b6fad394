//! The optional read-only SQLite index tier (§4.4): `${home}/state`, a
//! `threads` table, queried when present and schema-matching. Any
//! failure (missing file, missing table, column mismatch, query error)
//! is swallowed by the caller, which falls through to the filesystem
//! scan — this module only ever returns `rusqlite::Result`, it never
//! decides the fallback policy itself.

use std::path::Path;

use chrono::{DateTime, Utc};
use codex_agent_core::{GitInfo, SessionRecord, SessionSource, SortBy, SortOrder};
use rusqlite::{Connection, OptionalExtension};

use crate::error::IndexError;

const STATE_FILE_NAME: &str = "state";

/// Options accepted by the SQLite query tier; mirrors
/// `ListSessionsOptions` minus pagination, which is applied in SQL.
pub struct SqliteListOptions<'a> {
    pub source: Option<&'a str>,
    pub cwd: Option<&'a str>,
    pub git_branch: Option<&'a str>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

fn open_if_present(home: &Path) -> Option<Connection> {
    let path = home.join(STATE_FILE_NAME);
    if !path.exists() {
        return None;
    }
    Connection::open(&path).ok()
}

fn has_threads_table(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name='threads'",
        [],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .unwrap_or(None)
    .is_some()
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
    let id: String = row.get("id")?;
    let rollout_path: String = row.get("rollout_path")?;
    let created_at: DateTime<Utc> = row.get("created_at")?;
    let updated_at: DateTime<Utc> = row.get("updated_at")?;
    let source_str: String = row.get("source").unwrap_or_else(|_| "unknown".to_string());
    let source = match source_str.as_str() {
        "cli" => SessionSource::Cli,
        "vscode" => SessionSource::Vscode,
        "exec" => SessionSource::Exec,
        _ => SessionSource::Unknown,
    };
    let cwd: String = row.get("cwd").unwrap_or_default();
    let cli_version: String = row.get("cli_version").unwrap_or_else(|_| "unknown".to_string());
    let first_user_message: Option<String> = row.get("first_user_message").unwrap_or(None);
    let model_provider: Option<String> = row.get("model_provider").unwrap_or(None);
    let git_branch: Option<String> = row.get("git_branch").unwrap_or(None);
    let git_sha: Option<String> = row.get("git_sha").unwrap_or(None);
    let git_origin_url: Option<String> = row.get("git_origin_url").unwrap_or(None);

    let git = if git_branch.is_some() || git_sha.is_some() || git_origin_url.is_some() {
        Some(GitInfo {
            sha: git_sha,
            branch: git_branch,
            origin_url: git_origin_url,
        })
    } else {
        None
    };

    let title = SessionRecord::resolve_title(&id, first_user_message.as_deref());
    Ok(SessionRecord {
        id,
        rollout_path: rollout_path.into(),
        created_at,
        updated_at,
        source,
        model_provider,
        cwd,
        cli_version,
        title,
        first_user_message,
        archived_at: None,
        git,
        forked_from_id: None,
    })
}

/// `list_sessions` over the `threads` table. Returns `None` if `state`
/// is absent, unopenable, or lacks a `threads` table; `Some(Err(_))` for
/// a query failure against a schema that otherwise looked usable.
pub fn list_sessions(
    home: &Path,
    opts: &SqliteListOptions,
) -> Option<Result<(Vec<SessionRecord>, usize), IndexError>> {
    let conn = open_if_present(home)?;
    if !has_threads_table(&conn) {
        return None;
    }
    Some(query_sessions(&conn, opts))
}

fn query_sessions(
    conn: &Connection,
    opts: &SqliteListOptions,
) -> Result<(Vec<SessionRecord>, usize), IndexError> {
    let mut clauses = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(source) = opts.source {
        clauses.push("source = ?".to_string());
        params.push(Box::new(source.to_string()));
    }
    if let Some(cwd) = opts.cwd {
        clauses.push("cwd = ?".to_string());
        params.push(Box::new(cwd.to_string()));
    }
    if let Some(branch) = opts.git_branch {
        clauses.push("git_branch = ?".to_string());
        params.push(Box::new(branch.to_string()));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let order_col = match opts.sort_by {
        SortBy::CreatedAt => "created_at",
        SortBy::UpdatedAt => "updated_at",
    };
    let order_dir = match opts.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    let count_sql = format!("SELECT COUNT(*) FROM threads {where_clause}");
    let total: i64 = conn.query_row(
        &count_sql,
        rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
        |row| row.get(0),
    )?;

    let select_sql = format!(
        "SELECT id, rollout_path, created_at, updated_at, source, cwd, cli_version, \
         first_user_message, model_provider, git_branch, git_sha, git_origin_url \
         FROM threads {where_clause} ORDER BY {order_col} {order_dir} LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&select_sql)?;
    let mut all_params = params;
    all_params.push(Box::new(opts.limit as i64));
    all_params.push(Box::new(opts.offset as i64));

    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(all_params.iter().map(|p| p.as_ref())),
            row_to_record,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total as usize))
}

pub fn find_session(home: &Path, id: &str) -> Option<Result<Option<SessionRecord>, IndexError>> {
    let conn = open_if_present(home)?;
    if !has_threads_table(&conn) {
        return None;
    }
    let result = conn
        .query_row(
            "SELECT id, rollout_path, created_at, updated_at, source, cwd, cli_version, \
             first_user_message, model_provider, git_branch, git_sha, git_origin_url \
             FROM threads WHERE id = ?",
            [id],
            row_to_record,
        )
        .optional()
        .map_err(IndexError::from);
    Some(result)
}
