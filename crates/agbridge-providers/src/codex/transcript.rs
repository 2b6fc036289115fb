use super::schema::{MessageContent, ResponseItem, RolloutRecord};
use crate::traits::{Transcript, parse_rfc3339, value_to_text};
use agbridge_types::SessionMessage;
use serde_json::Value;

/// Prefixes of user-role messages that Codex injects as context.
const INJECTED_CONTEXT: &[&str] = &["<environment_context>", "<user_instructions>", "# AGENTS.md"];

fn is_injected_context(text: &str) -> bool {
    let text = text.trim_start();
    INJECTED_CONTEXT.iter().any(|prefix| text.starts_with(prefix))
}

fn message_text(content: &[MessageContent]) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            MessageContent::InputText { text } | MessageContent::OutputText { text } => {
                Some(text.as_str())
            }
            MessageContent::Unknown => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool output as display text.
///
/// Shell calls wrap their output as a JSON string `{"output": ..., "metadata": ...}`.
fn tool_output(output: &Value) -> Option<String> {
    if let Value::String(raw) = output
        && let Ok(Value::Object(wrapped)) = serde_json::from_str::<Value>(raw)
        && let Some(inner) = wrapped.get("output")
    {
        return value_to_text(inner);
    }
    value_to_text(output)
}

/// Normalize a whole rollout file.
pub fn parse_codex_rollout(text: &str) -> Transcript {
    let mut transcript = Transcript::default();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<RolloutRecord>(line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(line = index + 1, error = %err, "skipping malformed rollout line");
                continue;
            }
        };
        let RolloutRecord::ResponseItem(item) = record else {
            continue;
        };
        let timestamp = item.timestamp.as_deref().and_then(parse_rfc3339);

        let message = match item.payload {
            ResponseItem::Message { role, content } => {
                let text = message_text(&content);
                match role.as_str() {
                    "user" if !is_injected_context(&text) => Some(SessionMessage::user(text)),
                    "assistant" => Some(SessionMessage::assistant(text)),
                    // developer/system prompts
                    _ => None,
                }
            }
            ResponseItem::FunctionCall {
                name,
                arguments,
                call_id,
            } => Some(SessionMessage::tool_use(name, call_id, (!arguments.is_empty()).then_some(arguments))),
            ResponseItem::CustomToolCall {
                name,
                input,
                call_id,
            } => Some(SessionMessage::tool_use(name, call_id, (!input.is_empty()).then_some(input))),
            ResponseItem::FunctionCallOutput { call_id, output }
            | ResponseItem::CustomToolCallOutput { call_id, output } => {
                Some(SessionMessage::tool_result(call_id, tool_output(&output)))
            }
            ResponseItem::Unknown => None,
        };

        if let Some(message) = message {
            transcript.push(message.at(timestamp));
        }
    }

    transcript
}
