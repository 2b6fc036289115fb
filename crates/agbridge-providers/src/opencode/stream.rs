use super::schema::{StreamLine, StreamPart};
use crate::traits::{StreamParser, value_to_text};
use agbridge_types::ChatEvent;
use serde_json::Value;
use std::collections::HashSet;

/// Parser for `opencode run --format json`.
///
/// The session id is bound by the first `step_start` and never rebound.
/// Tool updates can repeat for one call id; the call is announced once and
/// its result is emitted once, whichever line carries it.
#[derive(Debug, Default)]
pub struct OpenCodeStreamParser {
    session_id: Option<String>,
    announced: HashSet<String>,
    resolved: HashSet<String>,
}

impl OpenCodeStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn tool_events(&mut self, part: &StreamPart) -> Vec<ChatEvent> {
        let Some(id) = part.tool_id().map(str::to_string) else {
            tracing::debug!("tool line without call id");
            return Vec::new();
        };

        let mut events = Vec::new();
        if self.announced.insert(id.clone()) {
            let input = part.input().map(|v| v.to_string());
            let mut call = ChatEvent::tool_use(part.tool_name(), id.clone(), input);
            call.content = part.title().map(str::to_string);
            events.push(call);
        }

        let output = part
            .output()
            .and_then(value_to_text)
            .or_else(|| part.error().map(str::to_string));
        if let Some(output) = output
            && self.resolved.insert(id.clone())
        {
            events.push(ChatEvent::tool_result(id, Some(output)));
        }
        events
    }
}

fn error_message(error: Option<&Value>) -> String {
    let Some(error) = error else {
        return "Unknown error".to_string();
    };
    if let Some(text) = error.as_str() {
        return text.to_string();
    }
    error
        .pointer("/data/message")
        .or_else(|| error.get("message"))
        .or_else(|| error.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string()
}

impl StreamParser for OpenCodeStreamParser {
    fn parse_line(&mut self, line: &str) -> Vec<ChatEvent> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let record = match serde_json::from_str::<StreamLine>(line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed stream line");
                return Vec::new();
            }
        };

        match record.kind.as_str() {
            "step_start" => match record.session_id {
                Some(id) if self.session_id.is_none() => {
                    self.session_id = Some(id.clone());
                    vec![ChatEvent::session_started(id)]
                }
                Some(id) => {
                    if self.session_id.as_deref() != Some(id.as_str()) {
                        tracing::debug!(id, "ignoring step_start for a different session");
                    }
                    Vec::new()
                }
                None => Vec::new(),
            },
            "text" => record
                .part
                .and_then(|p| p.text)
                .filter(|t| !t.is_empty())
                .map(|t| vec![ChatEvent::assistant(t)])
                .unwrap_or_default(),
            "tool_use" | "tool_call" => match record.part {
                Some(part) => self.tool_events(&part),
                None => Vec::new(),
            },
            "error" => vec![ChatEvent::error(error_message(record.error.as_ref()))],
            _ => Vec::new(),
        }
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}
