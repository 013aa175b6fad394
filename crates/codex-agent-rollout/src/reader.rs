//! Rollout file reading: whole-file load, session-meta-only extraction,
//! byte-offset-based event streaming, and first-user-message extraction.
//! Every function here treats the rollout file as something another
//! process is appending to; nothing in this crate writes one.

use std::path::Path;

use codex_agent_core::{Line, SessionMetaPayload};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader, SeekFrom};

use crate::codec::parse;
use crate::error::RolloutError;

/// Parse every line of a rollout file from the start, skipping any line
/// that doesn't parse. Returns the lines in file order.
pub async fn read_all(path: &Path) -> Result<Vec<Line>, RolloutError> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    let mut buf = String::new();
    loop {
        buf.clear();
        let bytes_read = reader.read_line(&mut buf).await?;
        if bytes_read == 0 {
            break;
        }
        if let Some(line) = parse(&buf) {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Read only as far as needed to find the first `session_meta` line.
///
/// Per §3, `session_meta` is always the first record of a well-formed
/// rollout file, but this scans past any leading lines that fail to parse
/// rather than assuming position zero.
pub async fn parse_session_meta(path: &Path) -> Result<SessionMetaPayload, RolloutError> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();
    loop {
        buf.clear();
        let bytes_read = reader.read_line(&mut buf).await?;
        if bytes_read == 0 {
            return Err(RolloutError::MissingSessionMeta);
        }
        if let Some(line) = parse(&buf) {
            if let Some(payload) = line.kind.as_session_meta() {
                return Ok(payload.clone());
            }
        }
    }
}

/// Read every parseable line strictly after `from_offset` bytes into the
/// file, returning both the parsed lines and the new end-of-file offset.
///
/// Used by the watcher to tail a file across append events without
/// re-reading content already delivered.
pub async fn stream_events(
    path: &Path,
    from_offset: u64,
) -> Result<(Vec<Line>, u64), RolloutError> {
    let mut file = File::open(path).await?;
    let metadata = file.metadata().await?;
    let len = metadata.len();
    if from_offset >= len {
        return Ok((Vec::new(), len));
    }
    file.seek(SeekFrom::Start(from_offset)).await?;
    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    let mut buf = String::new();
    let mut consumed: u64 = from_offset;
    loop {
        buf.clear();
        let bytes_read = reader.read_line(&mut buf).await? as u64;
        if bytes_read == 0 {
            break;
        }
        consumed += bytes_read;
        // A line without a trailing newline at EOF may be a partial write
        // in progress; leave it for the next read rather than parsing a
        // truncated JSON object.
        if !buf.ends_with('\n') {
            consumed -= bytes_read;
            break;
        }
        if let Some(line) = parse(&buf) {
            lines.push(line);
        }
    }
    Ok((lines, consumed))
}

/// The first user-authored, displayable message in the file, used to
/// derive a session's title when none is otherwise recorded.
pub async fn extract_first_user_message(path: &Path) -> Result<Option<String>, RolloutError> {
    let lines = read_all(path).await?;
    for line in lines {
        let Some(provenance) = &line.provenance else {
            continue;
        };
        if provenance.origin != codex_agent_core::Origin::UserInput {
            continue;
        }
        if let codex_agent_core::LineKind::EventMsg { payload } = &line.kind {
            if let Some(message) = payload.get("message").and_then(|v| v.as_str()) {
                return Ok(Some(message.to_string()));
            }
        }
        if let codex_agent_core::LineKind::ResponseItem { payload } = &line.kind {
            if let Some(content) = payload.get("content").and_then(|v| v.as_array()) {
                let text: String = content
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("");
                if !text.is_empty() {
                    return Ok(Some(text));
                }
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn write_lines(path: &Path, lines: &[&str]) {
        let mut file = File::create(path).await.unwrap();
        for line in lines {
            file.write_all(line.as_bytes()).await.unwrap();
            file.write_all(b"\n").await.unwrap();
        }
        file.flush().await.unwrap();
    }

    const META_LINE: &str = r#"{"timestamp":"2026-01-01T00:00:00Z","type":"session_meta","payload":{"meta":{"id":"s1","timestamp":"2026-01-01T00:00:00Z","cwd":"/tmp","originator":"codex","cli_version":"1.0","source":"cli"}}}"#;
    const USER_LINE: &str = r#"{"type":"UserMessage","message":"fix the bug please"}"#;

    #[tokio::test]
    async fn read_all_skips_unparsable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        write_lines(&path, &[META_LINE, "not json at all", ""]).await;
        let lines = read_all(&path).await.unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn parse_session_meta_finds_first_meta_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        write_lines(&path, &["garbage", META_LINE]).await;
        let meta = parse_session_meta(&path).await.unwrap();
        assert_eq!(meta.meta.id, "s1");
    }

    #[tokio::test]
    async fn parse_session_meta_missing_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        write_lines(&path, &["garbage", "more garbage"]).await;
        let result = parse_session_meta(&path).await;
        assert!(matches!(result, Err(RolloutError::MissingSessionMeta)));
    }

    #[tokio::test]
    async fn stream_events_reads_only_past_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        write_lines(&path, &[META_LINE]).await;
        let (first_batch, offset_after_first) = stream_events(&path, 0).await.unwrap();
        assert_eq!(first_batch.len(), 1);

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap();
        file.write_all(format!("{}\n", USER_LINE).as_bytes())
            .await
            .unwrap();
        file.flush().await.unwrap();

        let (second_batch, offset_after_second) =
            stream_events(&path, offset_after_first).await.unwrap();
        assert_eq!(second_batch.len(), 1);
        assert!(offset_after_second > offset_after_first);

        let (empty_batch, offset_unchanged) =
            stream_events(&path, offset_after_second).await.unwrap();
        assert!(empty_batch.is_empty());
        assert_eq!(offset_unchanged, offset_after_second);
    }

    #[tokio::test]
    async fn stream_events_leaves_partial_trailing_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        {
            let mut file = File::create(&path).await.unwrap();
            file.write_all(format!("{}\n", META_LINE).as_bytes())
                .await
                .unwrap();
            file.write_all(br#"{"type":"UserMessage","mess"#).await.unwrap();
            file.flush().await.unwrap();
        }
        let (lines, offset) = stream_events(&path, 0).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(offset, (META_LINE.len() + 1) as u64);
    }

    #[tokio::test]
    async fn extract_first_user_message_finds_plain_user_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        write_lines(&path, &[META_LINE, USER_LINE]).await;
        let message = extract_first_user_message(&path).await.unwrap();
        assert_eq!(message.as_deref(), Some("fix the bug please"));
    }

    #[tokio::test]
    async fn extract_first_user_message_skips_injected_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        let injected = r#"{"type":"UserMessage","message":"# AGENTS.md instructions\nfollow"}"#;
        write_lines(&path, &[META_LINE, injected, USER_LINE]).await;
        let message = extract_first_user_message(&path).await.unwrap();
        assert_eq!(message.as_deref(), Some("fix the bug please"));
    }

    #[tokio::test]
    async fn extract_first_user_message_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollout.jsonl");
        write_lines(&path, &[META_LINE]).await;
        let message = extract_first_user_message(&path).await.unwrap();
        assert!(message.is_none());
    }
}
