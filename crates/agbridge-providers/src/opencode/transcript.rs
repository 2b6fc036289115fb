use super::schema::{MessageInfo, PartInfo};
use crate::traits::{Transcript, from_millis, value_to_text};
use agbridge_types::{MessageKind, SessionMessage};

/// Append the canonical messages for one stored message and its parts.
///
/// Text parts follow the message role; tool parts yield a `tool_use` and,
/// once the tool has finished, a `tool_result` with the same call id.
/// Reasoning, step markers, snapshots and synthetic text are bookkeeping.
pub(crate) fn push_message(transcript: &mut Transcript, message: &MessageInfo, parts: &[PartInfo]) {
    let timestamp = message.time.created.and_then(from_millis);
    let role = match message.role.as_str() {
        "user" => MessageKind::User,
        "assistant" => MessageKind::Assistant,
        _ => MessageKind::System,
    };

    for part in parts {
        match part.kind.as_str() {
            "text" if !part.synthetic => {
                if let Some(text) = &part.text {
                    transcript.push(SessionMessage::new(role, text.clone()).at(timestamp));
                }
            }
            "tool" => {
                let call_id = part.call_id.as_deref().unwrap_or(part.id.as_str());
                let state = part.state.clone().unwrap_or_default();
                let input = state
                    .input
                    .as_ref()
                    .filter(|v| !v.is_null())
                    .map(|v| v.to_string());
                let name = part.tool.clone().unwrap_or_else(|| "tool".to_string());
                let mut call = SessionMessage::tool_use(name, call_id, input).at(timestamp);
                call.content = state.title.clone().filter(|t| !t.trim().is_empty());
                transcript.push(call);

                if state.status.as_deref() == Some("error") {
                    let error = state.error.unwrap_or_else(|| "Tool failed".to_string());
                    transcript.push(SessionMessage::tool_result(call_id, Some(error)).at(timestamp));
                } else if let Some(output) = state.output.as_ref().filter(|v| !v.is_null()) {
                    transcript.push(
                        SessionMessage::tool_result(call_id, value_to_text(output)).at(timestamp),
                    );
                }
            }
            _ => {}
        }
    }
}

/// Storage order for messages: creation time, then id (ids are monotonic).
pub(crate) fn sort_messages(messages: &mut [MessageInfo]) {
    messages.sort_by(|a, b| {
        a.time
            .created
            .unwrap_or(i64::MAX)
            .cmp(&b.time.created.unwrap_or(i64::MAX))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn part(value: serde_json::Value) -> PartInfo {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_tool_part_pairs_use_and_result() {
        let message: MessageInfo = serde_json::from_value(json!({
            "id": "msg_1", "role": "assistant", "time": {"created": 1735725600000i64}
        }))
        .unwrap();
        let parts = vec![
            part(json!({"id": "prt_1", "type": "step-start"})),
            part(json!({"id": "prt_2", "type": "text", "text": "Checking."})),
            part(json!({
                "id": "prt_3", "type": "tool", "tool": "bash", "callID": "call_1",
                "state": {"status": "completed", "input": {"command": "ls"}, "output": "a.rs\n", "title": "List files"}
            })),
            part(json!({"id": "prt_4", "type": "text", "text": "ctx", "synthetic": true})),
        ];

        let mut transcript = Transcript::default();
        push_message(&mut transcript, &message, &parts);

        let kinds: Vec<MessageKind> = transcript.messages.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::Assistant, MessageKind::ToolUse, MessageKind::ToolResult]
        );
        assert_eq!(transcript.messages[1].tool_id.as_deref(), Some("call_1"));
        assert_eq!(transcript.messages[1].content.as_deref(), Some("List files"));
        assert_eq!(transcript.messages[2].tool_id.as_deref(), Some("call_1"));
        assert_eq!(transcript.messages[2].content.as_deref(), Some("a.rs\n"));
    }

    #[test]
    fn test_failed_tool_reports_error_text() {
        let message: MessageInfo =
            serde_json::from_value(json!({"id": "msg_1", "role": "assistant"})).unwrap();
        let parts = vec![part(json!({
            "id": "prt_1", "type": "tool", "tool": "read", "callID": "c9",
            "state": {"status": "error", "input": {}, "error": "File not found"}
        }))];

        let mut transcript = Transcript::default();
        push_message(&mut transcript, &message, &parts);
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.messages[1].content.as_deref(), Some("File not found"));
    }

    #[test]
    fn test_sort_messages_by_creation() {
        let mut messages: Vec<MessageInfo> = vec![
            serde_json::from_value(json!({"id": "b", "role": "user", "time": {"created": 2}})).unwrap(),
            serde_json::from_value(json!({"id": "a", "role": "user", "time": {"created": 2}})).unwrap(),
            serde_json::from_value(json!({"id": "c", "role": "user", "time": {"created": 1}})).unwrap(),
        ];
        sort_messages(&mut messages);
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
