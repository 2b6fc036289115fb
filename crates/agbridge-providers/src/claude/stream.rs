use super::schema::{AssistantContent, StreamRecord, UserContent, tool_result_text};
use crate::traits::StreamParser;
use agbridge_types::ChatEvent;
use serde_json::Value;

/// Parser for `claude -p --output-format stream-json --include-partial-messages`.
///
/// - `system/init` binds the session id and yields one session-started event
/// - `stream_event` text deltas yield incremental assistant text
/// - `assistant` lines yield their tool calls (text already arrived as deltas)
/// - `user` lines yield tool results, keyed by the originating call id
/// - `result` lines with `is_error` yield an error
#[derive(Debug, Default)]
pub struct ClaudeStreamParser {
    session_id: Option<String>,
}

impl ClaudeStreamParser {
    pub fn new() -> Self {
        Self::default()
    }
}

fn text_delta(event: &Value) -> Option<&str> {
    if event.get("type")?.as_str()? != "content_block_delta" {
        return None;
    }
    let delta = event.get("delta")?;
    if delta.get("type")?.as_str()? != "text_delta" {
        return None;
    }
    delta.get("text")?.as_str()
}

impl StreamParser for ClaudeStreamParser {
    fn parse_line(&mut self, line: &str) -> Vec<ChatEvent> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let record = match serde_json::from_str::<StreamRecord>(line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed stream line");
                return Vec::new();
            }
        };

        match record {
            StreamRecord::System {
                subtype,
                session_id: Some(session_id),
            } if subtype.as_deref() == Some("init") => {
                self.session_id = Some(session_id.clone());
                vec![ChatEvent::session_started(session_id)]
            }
            StreamRecord::StreamEvent { event } => text_delta(&event)
                .filter(|text| !text.is_empty())
                .map(|text| vec![ChatEvent::assistant(text)])
                .unwrap_or_default(),
            StreamRecord::Assistant { message } => message
                .content
                .into_iter()
                .filter_map(|block| match block {
                    AssistantContent::ToolUse { id, name, input } => {
                        let input = (!input.is_null()).then(|| input.to_string());
                        Some(ChatEvent::tool_use(name, id, input))
                    }
                    _ => None,
                })
                .collect(),
            StreamRecord::User { message } => message
                .content
                .into_iter()
                .filter_map(|block| match block {
                    UserContent::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => Some(ChatEvent::tool_result(
                        tool_use_id,
                        tool_result_text(content.as_ref(), is_error),
                    )),
                    _ => None,
                })
                .collect(),
            StreamRecord::Result {
                is_error,
                result,
                session_id,
            } => {
                if self.session_id.is_none() {
                    self.session_id = session_id;
                }
                if is_error {
                    vec![ChatEvent::error(
                        result.unwrap_or_else(|| "Backend reported an error".to_string()),
                    )]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agbridge_types::ChatEventKind;

    #[test]
    fn test_init_then_delta() {
        let mut parser = ClaudeStreamParser::new();
        let mut events = parser.parse_line(r#"{"type":"system","subtype":"init","session_id":"abc123"}"#);
        events.extend(parser.parse_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}}"#,
        ));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChatEventKind::System);
        assert_eq!(events[0].session_id.as_deref(), Some("abc123"));
        assert!(events[0].content.as_deref().unwrap().contains("abc123"));
        assert_eq!(events[1].kind, ChatEventKind::Assistant);
        assert_eq!(events[1].content.as_deref(), Some("Hi"));
        assert_eq!(parser.session_id(), Some("abc123"));
    }

    #[test]
    fn test_assistant_line_yields_only_tool_calls() {
        let mut parser = ClaudeStreamParser::new();
        let events = parser.parse_line(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"dup"},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]}}"#,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChatEventKind::ToolUse);
        assert_eq!(events[0].tool_name.as_deref(), Some("Bash"));
        assert_eq!(events[0].tool_id.as_deref(), Some("t1"));
        assert_eq!(events[0].tool_input.as_deref(), Some(r#"{"command":"ls"}"#));
    }

    #[test]
    fn test_tool_result_is_keyed_by_call_id() {
        let mut parser = ClaudeStreamParser::new();
        let events = parser.parse_line(
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}"#,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChatEventKind::ToolResult);
        assert_eq!(events[0].tool_id.as_deref(), Some("t1"));
        assert_eq!(events[0].content.as_deref(), Some("ok"));
    }

    #[test]
    fn test_unknown_and_malformed_lines_are_ignored() {
        let mut parser = ClaudeStreamParser::new();
        assert!(parser.parse_line(r#"{"type":"rate_limit","x":1}"#).is_empty());
        assert!(parser.parse_line(r#"{"type":"stream_event","event":{"type":"message_start"}}"#).is_empty());
        assert!(parser.parse_line("{\"type\":").is_empty());
        assert!(parser.parse_line("").is_empty());
        assert_eq!(parser.session_id(), None);
    }

    #[test]
    fn test_error_result() {
        let mut parser = ClaudeStreamParser::new();
        let events = parser.parse_line(r#"{"type":"result","subtype":"error_during_execution","is_error":true,"result":"Credit balance too low","session_id":"s9"}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChatEventKind::Error);
        assert_eq!(parser.session_id(), Some("s9"));

        let ok = parser.parse_line(r#"{"type":"result","subtype":"success","is_error":false,"result":"done"}"#);
        assert!(ok.is_empty());
    }
}
