//! Changed-file summaries derived from shell-command heuristics (§3):
//! a prefix table classifies each exec'd command as a
//! creation/modification/deletion, and a path pattern picks out the
//! filenames it touched.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use codex_agent_core::{ChangedFileSummary, FileOperation, Line, LineKind};
use regex::Regex;
use serde_json::Value;

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_./\-]*[A-Za-z0-9_\-]\.[A-Za-z0-9]+$").unwrap())
}

fn classify_operation(command: &str) -> FileOperation {
    let trimmed = command.trim_start();
    if trimmed.starts_with("rm ") || trimmed == "rm" {
        FileOperation::Deleted
    } else if trimmed.starts_with("touch ") || command.contains("cat >") || command.contains("echo >") {
        FileOperation::Created
    } else {
        FileOperation::Modified
    }
}

/// Splits a shell command into whitespace tokens and keeps the ones
/// that look like a path ending in a filename with an extension.
fn extract_paths(command: &str) -> Vec<String> {
    command
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| c == '\'' || c == '"')
                .trim_start_matches('>')
                .to_string()
        })
        .filter(|token| path_pattern().is_match(token))
        .collect()
}

fn extract_command_text(payload: &Value) -> String {
    if let Some(s) = payload.get("command").and_then(|v| v.as_str()) {
        return s.to_string();
    }
    if let Some(items) = payload.get("command").and_then(|v| v.as_array()) {
        return items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" ");
    }
    String::new()
}

/// Accumulates changed-file summaries across a session's exec events.
#[derive(Debug, Default)]
pub struct FileChangeTracker {
    summaries: HashMap<String, ChangedFileSummary>,
}

impl FileChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a single rollout line; a no-op unless it's an
    /// `ExecCommandBegin` event or a `local_shell_call` item.
    pub fn process_line(&mut self, line: &Line) {
        match &line.kind {
            LineKind::EventMsg { payload }
                if payload.get("type").and_then(|v| v.as_str()) == Some("ExecCommandBegin") =>
            {
                let command = payload.get("command").and_then(|v| v.as_str()).unwrap_or("");
                self.record_command(command, line.timestamp);
            }
            LineKind::ResponseItem { payload }
                if payload.get("type").and_then(|v| v.as_str()) == Some("local_shell_call") =>
            {
                let command = extract_command_text(payload);
                self.record_command(&command, line.timestamp);
            }
            _ => {}
        }
    }

    fn record_command(&mut self, command: &str, timestamp: DateTime<Utc>) {
        if command.is_empty() {
            return;
        }
        let operation = classify_operation(command);
        for path in extract_paths(command) {
            let entry = self
                .summaries
                .entry(path.clone())
                .or_insert_with(|| ChangedFileSummary {
                    path,
                    operation,
                    change_count: 0,
                    last_modified: timestamp,
                });
            entry.operation = operation;
            entry.change_count += 1;
            entry.last_modified = timestamp;
        }
    }

    pub fn summaries(&self) -> Vec<ChangedFileSummary> {
        self.summaries.values().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<&ChangedFileSummary> {
        self.summaries.get(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codex_agent_core::Provenance;
    use serde_json::json;

    fn exec_begin(command: &str) -> Line {
        Line {
            timestamp: Utc::now(),
            kind: LineKind::EventMsg {
                payload: json!({"type": "ExecCommandBegin", "command": command}),
            },
            provenance: Some(Provenance::tool_generated(None)),
        }
    }

    fn local_shell_call(command: serde_json::Value) -> Line {
        Line {
            timestamp: Utc::now(),
            kind: LineKind::ResponseItem {
                payload: json!({"type": "local_shell_call", "status": "completed", "command": command}),
            },
            provenance: Some(Provenance::tool_generated(None)),
        }
    }

    #[test]
    fn rm_classifies_as_deleted() {
        let mut tracker = FileChangeTracker::new();
        tracker.process_line(&exec_begin("rm src/old.rs"));
        let summary = tracker.get("src/old.rs").unwrap();
        assert_eq!(summary.operation, FileOperation::Deleted);
        assert_eq!(summary.change_count, 1);
    }

    #[test]
    fn touch_and_redirect_classify_as_created() {
        let mut tracker = FileChangeTracker::new();
        tracker.process_line(&exec_begin("touch src/new.rs"));
        assert_eq!(tracker.get("src/new.rs").unwrap().operation, FileOperation::Created);

        tracker.process_line(&exec_begin("cat > src/generated.rs"));
        assert_eq!(
            tracker.get("src/generated.rs").unwrap().operation,
            FileOperation::Created
        );
    }

    #[test]
    fn other_commands_classify_as_modified() {
        let mut tracker = FileChangeTracker::new();
        tracker.process_line(&exec_begin("sed -i 's/a/b/' src/lib.rs"));
        assert_eq!(tracker.get("src/lib.rs").unwrap().operation, FileOperation::Modified);
    }

    #[test]
    fn paths_without_a_filename_extension_are_ignored() {
        let mut tracker = FileChangeTracker::new();
        tracker.process_line(&exec_begin("mkdir build"));
        assert!(tracker.summaries().is_empty());
    }

    #[test]
    fn repeated_commands_bump_change_count_and_operation() {
        let mut tracker = FileChangeTracker::new();
        tracker.process_line(&exec_begin("touch src/lib.rs"));
        tracker.process_line(&exec_begin("sed -i 's/a/b/' src/lib.rs"));
        let summary = tracker.get("src/lib.rs").unwrap();
        assert_eq!(summary.change_count, 2);
        assert_eq!(summary.operation, FileOperation::Modified);
    }

    #[test]
    fn local_shell_call_with_array_command_is_tracked() {
        let mut tracker = FileChangeTracker::new();
        tracker.process_line(&local_shell_call(json!(["rm", "-f", "build/output.log"])));
        assert_eq!(
            tracker.get("build/output.log").unwrap().operation,
            FileOperation::Deleted
        );
    }
}
