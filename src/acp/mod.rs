//! Canonical agent-transcript event schema ("ACP") and the dialect adapters
//! that normalize heterogeneous agent wire protocols into it.
//!
//! A dialect adapter is a small state machine (`DialectAdapter::process_line`)
//! fed one trimmed, non-empty line at a time; [`adapt_reader`] wraps that
//! state machine around a real `tokio::io::AsyncBufRead` so production
//! callers get genuine line-at-a-time streaming without pulling in a
//! separate streams crate this codebase's stack doesn't otherwise need.

pub mod claude;
pub mod codex;
pub mod native;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Exec,
    Read,
    Edit,
    Search,
    Think,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AcpEvent {
    SessionStart {
        #[serde(skip_serializing_if = "Option::is_none")]
        thread_id: Option<String>,
    },
    AgentMessage {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolStart {
        id: String,
        kind: ToolKind,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
    ToolComplete {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<ToolKind>,
        path: String,
    },
    Usage {
        #[serde(skip_serializing_if = "Option::is_none")]
        input_tokens: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        output_tokens: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cached_tokens: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cost_usd: Option<f64>,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

const TITLE_MAX: usize = 80;

/// Truncate to exactly 80 characters total, ending in a literal `"..."`,
/// shared by every dialect's title derivation.
pub fn truncate_title(text: &str) -> String {
    if text.chars().count() <= TITLE_MAX {
        return text.to_string();
    }
    let truncated: String = text.chars().take(TITLE_MAX - 3).collect();
    format!("{}...", truncated)
}

fn truncate_snippet(line: &str) -> String {
    const SNIPPET_MAX: usize = 200;
    if line.chars().count() <= SNIPPET_MAX {
        return line.to_string();
    }
    let truncated: String = line.chars().take(SNIPPET_MAX).collect();
    format!("{}…", truncated)
}

/// Shared title-derivation priority (command > file_path/notebook_path >
/// pattern > description > tool name), used by the Claude dialect and
/// reused by Codex's mcp_tool_call items.
pub fn classify_tool_call(name: &str, input: &Value) -> (ToolKind, String) {
    if let Some(command) = input.get("command").and_then(Value::as_str) {
        return (ToolKind::Exec, truncate_title(command));
    }
    if let Some(path) = input.get("file_path").or_else(|| input.get("notebook_path")).and_then(Value::as_str) {
        let kind = if name.eq_ignore_ascii_case("read") { ToolKind::Read } else { ToolKind::Edit };
        return (kind, truncate_title(path));
    }
    if let Some(pattern) = input.get("pattern").and_then(Value::as_str) {
        return (ToolKind::Search, truncate_title(pattern));
    }
    if let Some(description) = input.get("description").and_then(Value::as_str) {
        return (ToolKind::Think, truncate_title(description));
    }
    (ToolKind::Other, truncate_title(name))
}

/// Emits `session_start` at most once; subsequent observations are no-ops.
#[derive(Debug, Default)]
pub struct SessionStartTracker {
    emitted: bool,
}

impl SessionStartTracker {
    pub fn observe(&mut self, thread_id: Option<String>) -> Option<AcpEvent> {
        if self.emitted {
            return None;
        }
        self.emitted = true;
        Some(AcpEvent::SessionStart { thread_id })
    }
}

/// `T -> K` map recorded at `tool_start`, consulted at the matching
/// `tool_complete`. An unknown id yields `None` (surfaced as `kind:
/// undefined` in the emitted event, never a panic).
#[derive(Debug, Default)]
pub struct ToolKindTracker(HashMap<String, ToolKind>);

impl ToolKindTracker {
    pub fn record(&mut self, id: impl Into<String>, kind: ToolKind) {
        self.0.insert(id.into(), kind);
    }

    pub fn take(&mut self, id: &str) -> Option<ToolKind> {
        self.0.remove(id)
    }
}

/// Build the `error` event emitted for a line that fails to parse as JSON,
/// or whose shape a dialect otherwise rejects.
pub fn malformed_line_error(line: &str, message: impl std::fmt::Display) -> AcpEvent {
    AcpEvent::Error { message: format!("{}: {}", message, truncate_snippet(line)), stack: None }
}

/// A dialect's per-line state machine. `process_line` receives one trimmed,
/// non-empty line and returns zero or more ACP events.
pub trait DialectAdapter {
    fn process_line(&mut self, line: &str) -> Vec<AcpEvent>;
}

/// Read `reader` line by line (trimming, skipping blanks per the shared line
/// discipline) and forward every event `adapter` produces to `sink`. Runs to
/// EOF or until the sink is closed.
pub async fn adapt_reader<R, A>(reader: R, mut adapter: A, sink: Sender<AcpEvent>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    A: DialectAdapter,
{
    let mut lines = reader.lines();
    while let Some(raw) = lines.next_line().await? {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        for event in adapter.process_line(trimmed) {
            if sink.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}
