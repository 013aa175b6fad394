//! The unit the running-session queue is built from: either a whole
//! rollout line, or — under char-granularity streaming — a single code
//! point split out of an assistant message's text.

use chrono::{DateTime, Utc};
use codex_agent_core::{Line, LineKind};

#[derive(Debug, Clone)]
pub struct CharChunk {
    pub ch: char,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: Line,
}

#[derive(Debug, Clone)]
pub enum Chunk {
    Line(Line),
    Char(CharChunk),
}

/// Extracts the concatenated assistant text from a line, if it carries
/// one — an `AgentMessage` event, or a `response_item.message` with
/// `role=assistant` and `output_text`/`input_text` parts. Used to decide
/// whether `push_line` should split the line into `CharChunk`s.
pub fn assistant_text(line: &Line) -> Option<String> {
    match &line.kind {
        LineKind::EventMsg { payload } => {
            if payload.get("type").and_then(|v| v.as_str()) == Some("AgentMessage") {
                payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            } else {
                None
            }
        }
        LineKind::ResponseItem { payload } => {
            let is_message = payload.get("type").and_then(|v| v.as_str()) == Some("message");
            let is_assistant = payload.get("role").and_then(|v| v.as_str()) == Some("assistant");
            if !is_message || !is_assistant {
                return None;
            }
            let parts = payload.get("content")?.as_array()?;
            let text = parts
                .iter()
                .filter(|part| {
                    matches!(
                        part.get("type").and_then(|v| v.as_str()),
                        Some("output_text") | Some("input_text")
                    )
                })
                .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
                .collect::<Vec<_>>()
                .join("");
            Some(text)
        }
        _ => None,
    }
}
