//! The rollout codec: `parse`/`normalize`/`derive_provenance` (§4.1).
//!
//! `parse` accepts a raw JSONL line and returns a fully normalized,
//! provenance-tagged `Line`, or `None` for anything that can't be turned
//! into one — an empty line, unparsable JSON, or a record shape this
//! codec doesn't recognize. Parse failures are never fatal; this module
//! never returns an `Err` for a malformed line, only `None`.

use chrono::{DateTime, Utc};
use codex_agent_core::{
    GitInfo, Line, LineKind, Origin, Provenance, Role, SessionMeta, SessionMetaPayload,
    SessionSource,
};
use serde_json::Value;

/// Parse one JSONL line into a fully provenance-tagged `Line`.
///
/// Empty/whitespace-only input and JSON parse failures both yield `None`,
/// matching §4.1's "never propagates a parse error" contract.
pub fn parse(line: &str) -> Option<Line> {
    if line.trim().is_empty() {
        return None;
    }
    let value: Value = serde_json::from_str(line).ok()?;
    let (timestamp, kind) = normalize(value)?;
    let provenance = Some(derive_provenance(&kind));
    Some(Line {
        timestamp,
        kind,
        provenance,
    })
}

/// Accept either the canonical `{timestamp, type, payload}` shape or the
/// alternate `thread.*|turn.*|item.*|error` wire shape, folding the
/// latter into the five canonical variants.
fn normalize(value: Value) -> Option<(DateTime<Utc>, LineKind)> {
    let obj = value.as_object()?;
    let type_tag = obj.get("type")?.as_str()?;

    if matches!(
        type_tag,
        "session_meta" | "response_item" | "event_msg" | "turn_context" | "compacted"
    ) {
        let timestamp = obj
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let kind: LineKind = serde_json::from_value(value).ok()?;
        return Some((timestamp, kind));
    }

    normalize_alternate(type_tag, obj, &value)
}

fn normalize_alternate(
    type_tag: &str,
    obj: &serde_json::Map<String, Value>,
    value: &Value,
) -> Option<(DateTime<Utc>, LineKind)> {
    let raw_timestamp = obj
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    match type_tag {
        "thread.started" => {
            let thread_id = obj
                .get("thread_id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown-session")
                .to_string();
            let timestamp = raw_timestamp.unwrap_or_else(Utc::now);
            let kind = LineKind::SessionMeta {
                payload: SessionMetaPayload {
                    meta: SessionMeta {
                        id: thread_id,
                        timestamp,
                        cwd: String::new(),
                        originator: "codex".to_string(),
                        cli_version: "unknown".to_string(),
                        source: SessionSource::Exec,
                    },
                    git: None,
                },
            };
            Some((timestamp, kind))
        }
        "item.completed" => {
            let item = obj.get("item")?;
            let timestamp = raw_timestamp.unwrap_or_else(Utc::now);
            if item.get("type").and_then(|v| v.as_str()) == Some("agent_message") {
                let text = item.get("text")?.as_str()?.to_string();
                let kind = LineKind::EventMsg {
                    payload: serde_json::json!({
                        "type": "AgentMessage",
                        "message": text,
                    }),
                };
                Some((timestamp, kind))
            } else {
                let kind = LineKind::ResponseItem {
                    payload: item.clone(),
                };
                Some((timestamp, kind))
            }
        }
        "turn.started" | "turn.completed" | "error" => {
            let timestamp = raw_timestamp.unwrap_or_else(Utc::now);
            let event_type = match type_tag {
                "turn.started" => "TurnStarted",
                "turn.completed" => "TurnComplete",
                _ => "Error",
            };
            let mut payload = serde_json::json!({ "type": event_type });
            if let Some(turn_id) = obj.get("turn_id") {
                payload["turn_id"] = turn_id.clone();
            }
            if let Some(usage) = obj.get("usage") {
                payload["usage"] = usage.clone();
            }
            if let Some(message) = obj.get("message") {
                payload["message"] = message.clone();
            }
            let _ = value;
            Some((timestamp, LineKind::EventMsg { payload }))
        }
        _ => None,
    }
}

/// `deriveProvenance` — §3's classification rules.
pub fn derive_provenance(kind: &LineKind) -> Provenance {
    match kind {
        LineKind::SessionMeta { .. } | LineKind::TurnContext { .. } | LineKind::Compacted { .. } => {
            Provenance::framework_event(None)
        }
        LineKind::EventMsg { payload } => derive_event_msg_provenance(payload),
        LineKind::ResponseItem { payload } => derive_response_item_provenance(payload),
    }
}

fn derive_event_msg_provenance(payload: &Value) -> Provenance {
    let event_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match event_type {
        "UserMessage" => {
            let text = payload
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            classify_user_message_text(text)
        }
        "AgentMessage" => Provenance::tool_generated(Some(Role::Assistant)),
        _ => Provenance::framework_event(Some(&to_snake_case(event_type))),
    }
}

fn derive_response_item_provenance(payload: &Value) -> Provenance {
    let item_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match item_type {
        "message" => {
            let role = payload.get("role").and_then(|v| v.as_str()).unwrap_or("");
            match role {
                "assistant" => Provenance::tool_generated(Some(Role::Assistant)),
                "user" => {
                    let text = extract_message_text(payload);
                    classify_user_message_text(&text)
                }
                _ => Provenance::framework_event(Some(&to_snake_case(item_type))),
            }
        }
        "reasoning" | "local_shell_call" | "function_call" | "function_call_output" => {
            Provenance::tool_generated(None)
        }
        _ => Provenance::framework_event(Some(&to_snake_case(item_type))),
    }
}

/// `response_item.message` content is an array of parts; concatenate
/// whatever text fields are present for classification purposes.
fn extract_message_text(payload: &Value) -> String {
    payload
        .get("content")
        .and_then(|v| v.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// The injected-source classification shared by `UserMessage` and
/// `response_item.message{role=user}` text.
fn classify_user_message_text(text: &str) -> Provenance {
    let trimmed = text.trim_start();
    if trimmed.starts_with("# AGENTS.md instructions") {
        Provenance::system_injected("agents_instructions")
    } else if trimmed.starts_with("<environment_context>") {
        Provenance::system_injected("environment_context")
    } else if trimmed.starts_with("<turn_aborted>") {
        Provenance::framework_event(Some("turn_aborted"))
    } else {
        Provenance::user_input()
    }
}

pub fn is_injected_source_tag(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with("# AGENTS.md instructions")
        || trimmed.starts_with("<environment_context>")
        || trimmed.starts_with("<turn_aborted>")
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_lines_parse_to_none() {
        assert!(parse("").is_none());
        assert!(parse("   \n").is_none());
    }

    #[test]
    fn unparsable_json_parses_to_none() {
        assert!(parse("{not json").is_none());
    }

    #[test]
    fn session_meta_is_framework_event_not_displayed() {
        let line = parse(r#"{"timestamp":"2026-01-01T00:00:00Z","type":"session_meta","payload":{"meta":{"id":"s1","timestamp":"2026-01-01T00:00:00Z","cwd":"/tmp","originator":"codex","cli_version":"1.0","source":"cli"}}}"#).unwrap();
        let prov = line.provenance.unwrap();
        assert_eq!(prov.origin, Origin::FrameworkEvent);
        assert!(!prov.display_default);
    }

    #[test]
    fn user_message_agents_md_is_system_injected() {
        let payload = serde_json::json!({
            "type": "UserMessage",
            "message": "# AGENTS.md instructions\nfollow these",
        });
        let kind = LineKind::EventMsg { payload };
        let prov = derive_provenance(&kind);
        assert_eq!(prov.origin, Origin::SystemInjected);
        assert_eq!(prov.source_tag.as_deref(), Some("agents_instructions"));
    }

    #[test]
    fn user_message_environment_context_is_system_injected() {
        let payload = serde_json::json!({
            "type": "UserMessage",
            "message": "<environment_context>stuff</environment_context>",
        });
        let kind = LineKind::EventMsg { payload };
        let prov = derive_provenance(&kind);
        assert_eq!(prov.origin, Origin::SystemInjected);
        assert_eq!(prov.source_tag.as_deref(), Some("environment_context"));
    }

    #[test]
    fn user_message_turn_aborted_is_framework_event() {
        let payload = serde_json::json!({
            "type": "UserMessage",
            "message": "<turn_aborted>",
        });
        let kind = LineKind::EventMsg { payload };
        let prov = derive_provenance(&kind);
        assert_eq!(prov.origin, Origin::FrameworkEvent);
        assert_eq!(prov.source_tag.as_deref(), Some("turn_aborted"));
    }

    #[test]
    fn plain_user_message_is_user_input_displayed() {
        let payload = serde_json::json!({
            "type": "UserMessage",
            "message": "hello there",
        });
        let kind = LineKind::EventMsg { payload };
        let prov = derive_provenance(&kind);
        assert_eq!(prov.origin, Origin::UserInput);
        assert!(prov.display_default);
    }

    #[test]
    fn agent_message_is_tool_generated_assistant() {
        let payload = serde_json::json!({ "type": "AgentMessage", "message": "hi" });
        let kind = LineKind::EventMsg { payload };
        let prov = derive_provenance(&kind);
        assert_eq!(prov.origin, Origin::ToolGenerated);
        assert_eq!(prov.role, Some(Role::Assistant));
        assert!(prov.display_default);
    }

    #[test]
    fn function_call_is_tool_generated_displayed() {
        let payload = serde_json::json!({ "type": "function_call", "call_id": "c1", "name": "x", "arguments": "{}" });
        let kind = LineKind::ResponseItem { payload };
        let prov = derive_provenance(&kind);
        assert_eq!(prov.origin, Origin::ToolGenerated);
        assert!(prov.display_default);
    }

    #[test]
    fn unknown_response_item_is_framework_event_not_displayed() {
        let payload = serde_json::json!({ "type": "WeirdThing" });
        let kind = LineKind::ResponseItem { payload };
        let prov = derive_provenance(&kind);
        assert_eq!(prov.origin, Origin::FrameworkEvent);
        assert!(!prov.display_default);
        assert_eq!(prov.source_tag.as_deref(), Some("weird_thing"));
    }

    #[test]
    fn thread_started_synthesizes_session_meta() {
        let line = parse(r#"{"type":"thread.started","thread_id":"resolved-001"}"#).unwrap();
        let meta = line.kind.as_session_meta().unwrap();
        assert_eq!(meta.meta.id, "resolved-001");
        assert_eq!(meta.meta.source, SessionSource::Exec);
    }

    #[test]
    fn thread_started_without_id_falls_back() {
        let line = parse(r#"{"type":"thread.started"}"#).unwrap();
        let meta = line.kind.as_session_meta().unwrap();
        assert_eq!(meta.meta.id, "unknown-session");
    }

    #[test]
    fn item_completed_agent_message_becomes_event_msg() {
        let line = parse(r#"{"type":"item.completed","item":{"type":"agent_message","text":"hello"}}"#).unwrap();
        match line.kind {
            LineKind::EventMsg { payload } => {
                assert_eq!(payload["type"], "AgentMessage");
                assert_eq!(payload["message"], "hello");
            }
            _ => panic!("expected EventMsg"),
        }
    }

    #[test]
    fn item_completed_other_becomes_response_item() {
        let line = parse(r#"{"type":"item.completed","item":{"type":"local_shell_call","status":"completed"}}"#).unwrap();
        assert!(matches!(line.kind, LineKind::ResponseItem { .. }));
    }

    #[test]
    fn turn_events_map_to_event_msg_variants() {
        let started = parse(r#"{"type":"turn.started","turn_id":"t1"}"#).unwrap();
        match started.kind {
            LineKind::EventMsg { payload } => assert_eq!(payload["type"], "TurnStarted"),
            _ => panic!(),
        }

        let completed = parse(r#"{"type":"turn.completed","turn_id":"t1","usage":{"input_tokens":1}}"#).unwrap();
        match completed.kind {
            LineKind::EventMsg { payload } => assert_eq!(payload["type"], "TurnComplete"),
            _ => panic!(),
        }

        let err = parse(r#"{"type":"error","message":"boom"}"#).unwrap();
        match err.kind {
            LineKind::EventMsg { payload } => {
                assert_eq!(payload["type"], "Error");
                assert_eq!(payload["message"], "boom");
            }
            _ => panic!(),
        }
    }

    #[test]
    fn unrecognized_shape_parses_to_none() {
        assert!(parse(r#"{"type":"something.unknown"}"#).is_none());
        assert!(parse(r#"{"foo":"bar"}"#).is_none());
    }

    #[test]
    fn parse_round_trip_preserves_tag() {
        let original = r#"{"timestamp":"2026-01-01T00:00:00Z","type":"response_item","payload":{"type":"function_call","call_id":"c1","name":"read_file","arguments":"{}"}}"#;
        let line = parse(original).unwrap();
        let reserialized = serde_json::to_string(&line.kind).unwrap();
        let value: Value = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(value["type"], "response_item");
        assert_eq!(value["payload"]["name"], "read_file");
    }
}
