//! Codex-style dialect: `{type, ...}` frames with `thread.started`,
//! `turn.started`, `turn.failed`, `turn.completed`, `item.started`,
//! `item.completed`. Items carry `{id, type}` where `type` is one of
//! `command_execution`, `file_edit`, `thinking`, `mcp_tool_call`,
//! `reasoning`, `agent_message`.

use super::{malformed_line_error, truncate_title, AcpEvent, DialectAdapter, SessionStartTracker, ToolKind, ToolKindTracker};
use serde_json::Value;

const TOOL_ITEM_TYPES: &[&str] = &["command_execution", "file_edit", "mcp_tool_call"];

#[derive(Default)]
pub struct CodexAdapter {
    session: SessionStartTracker,
    tool_kinds: ToolKindTracker,
}

impl CodexAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_thread_started(&mut self, frame: &Value) -> Vec<AcpEvent> {
        let thread_id = frame.get("thread_id").and_then(Value::as_str).map(str::to_string);
        self.session.observe(thread_id).into_iter().collect()
    }

    fn handle_turn_failed(&self, frame: &Value) -> Vec<AcpEvent> {
        let message = frame.get("message").and_then(Value::as_str).unwrap_or("turn failed").to_string();
        vec![AcpEvent::Error { message, stack: None }]
    }

    fn handle_turn_completed(&self, frame: &Value) -> Vec<AcpEvent> {
        let has_usage = frame.get("input_tokens").is_some() || frame.get("output_tokens").is_some();
        if !has_usage {
            return Vec::new();
        }
        vec![AcpEvent::Usage {
            input_tokens: frame.get("input_tokens").and_then(Value::as_u64),
            output_tokens: frame.get("output_tokens").and_then(Value::as_u64),
            cached_tokens: frame.get("cached_tokens").and_then(Value::as_u64),
            cost_usd: frame.get("cost_usd").and_then(Value::as_f64),
        }]
    }

    fn handle_item_started(&mut self, frame: &Value) -> Vec<AcpEvent> {
        let Some(item) = frame.get("item") else { return Vec::new() };
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
        if !TOOL_ITEM_TYPES.contains(&item_type) {
            return Vec::new();
        }
        let id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let (kind, title) = classify_item(item_type, item);
        self.tool_kinds.record(id.clone(), kind);
        let input = item.get("input").cloned();
        vec![AcpEvent::ToolStart { id, kind, title, input }]
    }

    fn handle_item_completed(&mut self, frame: &Value) -> Vec<AcpEvent> {
        let Some(item) = frame.get("item") else { return Vec::new() };
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
        let id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_string();

        if TOOL_ITEM_TYPES.contains(&item_type) {
            let kind = self.tool_kinds.take(&id);
            let path = item
                .get("output")
                .or_else(|| item.get("result"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return vec![AcpEvent::ToolComplete { id, kind, path }];
        }

        match item_type {
            "reasoning" => {
                let text = first_present_text(item, &["text", "content", "summary"]);
                vec![AcpEvent::Reasoning { text }]
            }
            "agent_message" => {
                let text = first_present_text(item, &["text", "content"]);
                vec![AcpEvent::AgentMessage { text }]
            }
            _ => Vec::new(),
        }
    }
}

fn classify_item(item_type: &str, item: &Value) -> (ToolKind, String) {
    match item_type {
        "command_execution" => {
            let command = item.get("command").and_then(Value::as_str).unwrap_or("command");
            (ToolKind::Exec, truncate_title(command))
        }
        "file_edit" => {
            let path = item.get("path").and_then(Value::as_str).unwrap_or("file");
            (ToolKind::Edit, truncate_title(path))
        }
        "mcp_tool_call" => {
            let name = item.get("tool_name").or_else(|| item.get("name")).and_then(Value::as_str).unwrap_or("tool");
            (ToolKind::Other, truncate_title(name))
        }
        _ => (ToolKind::Other, truncate_title(item_type)),
    }
}

fn first_present_text(item: &Value, keys: &[&str]) -> String {
    for key in keys {
        if let Some(text) = item.get(*key).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    String::new()
}

impl DialectAdapter for CodexAdapter {
    fn process_line(&mut self, line: &str) -> Vec<AcpEvent> {
        let frame: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => return vec![malformed_line_error(line, err)],
        };
        match frame.get("type").and_then(Value::as_str) {
            Some("thread.started") => self.handle_thread_started(&frame),
            Some("turn.failed") => self.handle_turn_failed(&frame),
            Some("turn.completed") => self.handle_turn_completed(&frame),
            Some("item.started") => self.handle_item_started(&frame),
            Some("item.completed") => self.handle_item_completed(&frame),
            _ => Vec::new(),
        }
    }
}
