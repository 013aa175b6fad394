//! Stateful mapping from the chunk stream to provider-agnostic events
//! (§4.7): `assistant.delta`/`assistant.snapshot`, `tool.call`/
//! `tool.result`, `activity`, and `session.*`.

use std::collections::{HashMap, HashSet};

use codex_agent_core::LineKind;
use serde::Serialize;
use serde_json::{json, Value};

use crate::chunk::Chunk;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedEvent {
    SessionStarted { session_id: String, resumed: bool },
    AssistantDelta { session_id: String, text: String },
    AssistantSnapshot { session_id: String, content: String },
    Activity { session_id: String, message: String },
    ToolCall { session_id: String, name: String, input: Value },
    ToolResult { session_id: String, name: String, is_error: bool, output: Value },
    SessionError { session_id: String, message: String },
}

/// Whether `session_meta` lines produce a `SessionStarted` event. Set to
/// `Bare` for fan-out contexts (group/queue runners) that already emit
/// their own lifecycle events and don't want a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartedMode {
    IncludeStarted,
    Bare,
}

/// One normalizer instance per run: it remembers which sessions it has
/// already announced, each session's accumulated assistant text, and
/// which tool name owns each in-flight call id.
pub struct Normalizer {
    mode: StartedMode,
    started_session_ids: HashSet<String>,
    assistant_snapshots: HashMap<String, String>,
    tool_names_by_call_id: HashMap<String, String>,
}

impl Normalizer {
    pub fn new(mode: StartedMode) -> Self {
        Self {
            mode,
            started_session_ids: HashSet::new(),
            assistant_snapshots: HashMap::new(),
            tool_names_by_call_id: HashMap::new(),
        }
    }

    pub fn process(&mut self, session_id: &str, chunk: &Chunk) -> Vec<NormalizedEvent> {
        match chunk {
            Chunk::Char(char_chunk) => {
                self.append_and_snapshot(session_id, &char_chunk.ch.to_string())
            }
            Chunk::Line(line) => self.process_line(session_id, line),
        }
    }

    fn process_line(&mut self, session_id: &str, line: &codex_agent_core::Line) -> Vec<NormalizedEvent> {
        match &line.kind {
            LineKind::SessionMeta { .. } => {
                if self.mode == StartedMode::IncludeStarted
                    && self.started_session_ids.insert(session_id.to_string())
                {
                    vec![NormalizedEvent::SessionStarted {
                        session_id: session_id.to_string(),
                        resumed: false,
                    }]
                } else {
                    Vec::new()
                }
            }
            LineKind::EventMsg { payload } => self.process_event_msg(session_id, payload),
            LineKind::ResponseItem { payload } => self.process_response_item(session_id, payload),
            LineKind::TurnContext { .. } | LineKind::Compacted { .. } => Vec::new(),
        }
    }

    fn process_event_msg(&mut self, session_id: &str, payload: &Value) -> Vec<NormalizedEvent> {
        let event_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match event_type {
            "AgentMessage" => {
                let text = payload.get("message").and_then(|v| v.as_str()).unwrap_or("");
                self.append_and_snapshot(session_id, text)
            }
            "AgentReasoning" => {
                let text = payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
                vec![NormalizedEvent::Activity {
                    session_id: session_id.to_string(),
                    message: text.to_string(),
                }]
            }
            "ExecCommandBegin" => {
                let input = json!({
                    "call_id": payload.get("call_id"),
                    "turn_id": payload.get("turn_id"),
                    "cwd": payload.get("cwd"),
                    "command": payload.get("command"),
                });
                vec![NormalizedEvent::ToolCall {
                    session_id: session_id.to_string(),
                    name: "local_shell".to_string(),
                    input,
                }]
            }
            "ExecCommandEnd" => {
                let exit_code = payload.get("exit_code").and_then(|v| v.as_i64());
                let is_error = exit_code.map(|code| code != 0).unwrap_or(false);
                vec![NormalizedEvent::ToolResult {
                    session_id: session_id.to_string(),
                    name: "local_shell".to_string(),
                    is_error,
                    output: payload.clone(),
                }]
            }
            "Error" => {
                let message = payload.get("message").and_then(|v| v.as_str()).unwrap_or("");
                vec![NormalizedEvent::SessionError {
                    session_id: session_id.to_string(),
                    message: message.to_string(),
                }]
            }
            other => vec![NormalizedEvent::Activity {
                session_id: session_id.to_string(),
                message: other.to_string(),
            }],
        }
    }

    fn process_response_item(&mut self, session_id: &str, payload: &Value) -> Vec<NormalizedEvent> {
        let item_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match item_type {
            "function_call" => {
                let call_id = payload.get("call_id").and_then(|v| v.as_str()).unwrap_or("");
                let name = payload
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown-tool")
                    .to_string();
                self.tool_names_by_call_id
                    .insert(call_id.to_string(), name.clone());
                let input = payload
                    .get("arguments")
                    .and_then(|v| v.as_str())
                    .map(parse_maybe_json)
                    .unwrap_or(Value::Null);
                vec![NormalizedEvent::ToolCall {
                    session_id: session_id.to_string(),
                    name,
                    input,
                }]
            }
            "function_call_output" => {
                let call_id = payload.get("call_id").and_then(|v| v.as_str()).unwrap_or("");
                let name = self
                    .tool_names_by_call_id
                    .get(call_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown-tool".to_string());
                let output = payload.get("output").cloned().unwrap_or(Value::Null);
                let is_error = output.get("is_error").and_then(|v| v.as_bool()) == Some(true)
                    || output.get("status").and_then(|v| v.as_str()) == Some("error");
                vec![NormalizedEvent::ToolResult {
                    session_id: session_id.to_string(),
                    name,
                    is_error,
                    output,
                }]
            }
            "local_shell_call" => {
                let status = payload.get("status").and_then(|v| v.as_str()).unwrap_or("");
                let call_id = payload.get("call_id").cloned().unwrap_or(Value::Null);
                let action = payload.get("action").cloned().unwrap_or(Value::Null);
                if matches!(status, "completed" | "failed" | "error") {
                    let output = json!({
                        "call_id": call_id,
                        "status": status,
                        "action": action,
                        "output": payload.get("output"),
                    });
                    vec![NormalizedEvent::ToolResult {
                        session_id: session_id.to_string(),
                        name: "local_shell".to_string(),
                        is_error: status != "completed",
                        output,
                    }]
                } else {
                    let input = json!({"call_id": call_id, "status": status, "action": action});
                    vec![NormalizedEvent::ToolCall {
                        session_id: session_id.to_string(),
                        name: "local_shell".to_string(),
                        input,
                    }]
                }
            }
            "message" => {
                let role = payload.get("role").and_then(|v| v.as_str()).unwrap_or("");
                if role != "assistant" {
                    return Vec::new();
                }
                let Some(parts) = payload.get("content").and_then(|v| v.as_array()) else {
                    return Vec::new();
                };
                let mut events = Vec::new();
                for part in parts {
                    let part_type = part.get("type").and_then(|v| v.as_str());
                    if !matches!(part_type, Some("output_text") | Some("input_text")) {
                        continue;
                    }
                    let text = part.get("text").and_then(|v| v.as_str()).unwrap_or("");
                    events.extend(self.append_and_snapshot(session_id, text));
                }
                events
            }
            _ => Vec::new(),
        }
    }

    fn append_and_snapshot(&mut self, session_id: &str, text: &str) -> Vec<NormalizedEvent> {
        if text.is_empty() {
            return Vec::new();
        }
        let entry = self
            .assistant_snapshots
            .entry(session_id.to_string())
            .or_default();
        entry.push_str(text);
        let content = entry.clone();
        vec![
            NormalizedEvent::AssistantDelta {
                session_id: session_id.to_string(),
                text: text.to_string(),
            },
            NormalizedEvent::AssistantSnapshot {
                session_id: session_id.to_string(),
                content,
            },
        ]
    }
}

fn parse_maybe_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
