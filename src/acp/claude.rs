//! Claude-style dialect: `{type: "assistant", sessionId?, message: {content:
//! [...]}}` frames carrying `text`/`tool_use` blocks, `{type: "user",
//! message: {content: [{type: "tool_result", ...}]}}` completions, and a
//! terminal `{type: "result", ...}` usage frame.

use super::{classify_tool_call, malformed_line_error, AcpEvent, DialectAdapter, SessionStartTracker, ToolKindTracker};
use serde_json::Value;

#[derive(Default)]
pub struct ClaudeAdapter {
    session: SessionStartTracker,
    tool_kinds: ToolKindTracker,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn session_event(&mut self, frame: &Value) -> Option<AcpEvent> {
        let thread_id = frame.get("sessionId").and_then(Value::as_str).map(str::to_string);
        self.session.observe(thread_id)
    }

    fn handle_assistant(&mut self, frame: &Value) -> Vec<AcpEvent> {
        let mut events: Vec<AcpEvent> = self.session_event(frame).into_iter().collect();
        let Some(blocks) = frame.pointer("/message/content").and_then(Value::as_array) else {
            return events;
        };
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        events.push(AcpEvent::AgentMessage { text: text.to_string() });
                    }
                }
                Some("tool_use") => {
                    let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(Value::as_str).unwrap_or("tool");
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    let (kind, title) = classify_tool_call(name, &input);
                    self.tool_kinds.record(id.clone(), kind);
                    events.push(AcpEvent::ToolStart {
                        id,
                        kind,
                        title,
                        input: if input.is_null() { None } else { Some(input) },
                    });
                }
                _ => {}
            }
        }
        events
    }

    fn handle_user(&mut self, frame: &Value) -> Vec<AcpEvent> {
        let Some(blocks) = frame.pointer("/message/content").and_then(Value::as_array) else {
            return Vec::new();
        };
        blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_result"))
            .map(|block| {
                let id = block.get("tool_use_id").and_then(Value::as_str).unwrap_or_default().to_string();
                let kind = self.tool_kinds.take(&id);
                let path = summarize_content(block.get("content"));
                AcpEvent::ToolComplete { id, kind, path }
            })
            .collect()
    }

    fn handle_result(&self, frame: &Value) -> Vec<AcpEvent> {
        vec![AcpEvent::Usage {
            input_tokens: frame.get("input_tokens").and_then(Value::as_u64),
            output_tokens: frame.get("output_tokens").and_then(Value::as_u64),
            cached_tokens: frame.get("cached_tokens").and_then(Value::as_u64),
            cost_usd: frame.get("cost_usd").and_then(Value::as_f64),
        }]
    }
}

fn summarize_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

impl DialectAdapter for ClaudeAdapter {
    fn process_line(&mut self, line: &str) -> Vec<AcpEvent> {
        let frame: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => return vec![malformed_line_error(line, err)],
        };
        match frame.get("type").and_then(Value::as_str) {
            Some("assistant") => self.handle_assistant(&frame),
            Some("user") => self.handle_user(&frame),
            Some("result") => self.handle_result(&frame),
            _ => Vec::new(),
        }
    }
}
