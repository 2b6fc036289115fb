use super::schema::{AssistantContent, ClaudeRecord, UserContent, tool_result_text};
use crate::traits::{Transcript, parse_rfc3339};
use agbridge_types::SessionMessage;

/// Normalize a Claude Code JSONL transcript.
///
/// Kept: user text, tool results, assistant text and tool calls.
/// Dropped: meta and sidechain records, thinking blocks, snapshots and every
/// other bookkeeping line. `summary` lines set the declared session name.
pub fn parse_claude_transcript(text: &str) -> Transcript {
    let mut transcript = Transcript::default();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<ClaudeRecord>(line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(line = index + 1, error = %err, "skipping malformed transcript line");
                continue;
            }
        };

        match record {
            ClaudeRecord::User(user) => {
                if user.is_meta || user.is_sidechain {
                    continue;
                }
                let timestamp = user.timestamp.as_deref().and_then(parse_rfc3339);
                for block in user.message.content {
                    match block {
                        UserContent::Text { text } => {
                            transcript.push(SessionMessage::user(text).at(timestamp));
                        }
                        UserContent::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => {
                            let output = tool_result_text(content.as_ref(), is_error);
                            transcript
                                .push(SessionMessage::tool_result(tool_use_id, output).at(timestamp));
                        }
                        UserContent::Unknown => {}
                    }
                }
            }
            ClaudeRecord::Assistant(assistant) => {
                if assistant.is_sidechain {
                    continue;
                }
                let timestamp = assistant.timestamp.as_deref().and_then(parse_rfc3339);
                for block in assistant.message.content {
                    match block {
                        AssistantContent::Text { text } => {
                            transcript.push(SessionMessage::assistant(text).at(timestamp));
                        }
                        AssistantContent::ToolUse { id, name, input } => {
                            let input = (!input.is_null()).then(|| input.to_string());
                            transcript.push(SessionMessage::tool_use(name, id, input).at(timestamp));
                        }
                        AssistantContent::Unknown => {}
                    }
                }
            }
            ClaudeRecord::Summary(summary) => {
                let name = summary.summary.trim();
                if !name.is_empty() {
                    transcript.declared_name = Some(name.to_string());
                }
            }
            ClaudeRecord::Unknown => {}
        }
    }

    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use agbridge_types::MessageKind;

    const TRANSCRIPT: &str = r#"{"type":"summary","summary":"Fix login bug","leafUuid":"x"}
{"type":"user","uuid":"u0","sessionId":"s1","timestamp":"2025-01-01T10:00:00Z","isMeta":true,"message":{"role":"user","content":"<command-name>/init</command-name>"}}
{"type":"user","uuid":"u1","sessionId":"s1","timestamp":"2025-01-01T10:00:01Z","message":{"role":"user","content":"Why does login fail?"}}
{"type":"assistant","uuid":"a1","sessionId":"s1","timestamp":"2025-01-01T10:00:02Z","message":{"id":"m1","role":"assistant","model":"claude","content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"Let me look."},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"src/login.rs"}}]}}
not json at all
{"type":"system","subtype":"compact_boundary","content":"compacted"}
{"type":"user","uuid":"u2","sessionId":"s1","timestamp":"2025-01-01T10:00:03Z","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":[{"type":"text","text":"fn login() {}"}]}]}}
{"type":"assistant","uuid":"a2","sessionId":"s1","timestamp":"2025-01-01T10:00:04Z","message":{"id":"m2","role":"assistant","model":"claude","content":[{"type":"text","text":"   "}]}}
"#;

    #[test]
    fn test_parse_keeps_meaningful_messages_in_order() {
        let transcript = parse_claude_transcript(TRANSCRIPT);
        let kinds: Vec<MessageKind> = transcript.messages.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::User,
                MessageKind::Assistant,
                MessageKind::ToolUse,
                MessageKind::ToolResult,
            ]
        );
        assert_eq!(transcript.declared_name.as_deref(), Some("Fix login bug"));
    }

    #[test]
    fn test_tool_use_and_result_share_id() {
        let transcript = parse_claude_transcript(TRANSCRIPT);
        let call = &transcript.messages[2];
        let result = &transcript.messages[3];
        assert_eq!(call.tool_name.as_deref(), Some("Read"));
        assert_eq!(call.tool_input.as_deref(), Some(r#"{"file_path":"src/login.rs"}"#));
        assert_eq!(call.tool_id, result.tool_id);
        assert_eq!(result.content.as_deref(), Some("fn login() {}"));
    }

    #[test]
    fn test_timestamps_are_parsed() {
        let transcript = parse_claude_transcript(TRANSCRIPT);
        let ts = transcript.messages[0].timestamp.unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-01T10:00:01+00:00");
    }

    #[test]
    fn test_failed_tool_without_output_is_marked() {
        let transcript = parse_claude_transcript(
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t9","content":"","is_error":true},{"type":"tool_result","tool_use_id":"t10","content":"denied","is_error":true}]}}"#,
        );
        assert_eq!(transcript.messages[0].content.as_deref(), Some("Tool failed"));
        assert_eq!(transcript.messages[1].content.as_deref(), Some("denied"));
    }
}
