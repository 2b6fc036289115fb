use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageKind, SessionMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    System,
    /// Only produced when replaying stored history ahead of a resumed turn.
    User,
    Assistant,
    ToolUse,
    ToolResult,
    Error,
    Done,
}

/// Canonical incremental event emitted to the caller during a live turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub kind: ChatEventKind,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<String>,
    /// Backend session id, set on the event that binds a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatEvent {
    pub fn new(kind: ChatEventKind, content: Option<String>) -> Self {
        Self {
            kind,
            content,
            tool_name: None,
            tool_id: None,
            tool_input: None,
            session_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatEventKind::System, Some(content.into()))
    }

    pub fn session_started(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let mut event = Self::system(format!("Session started ({})", session_id));
        event.session_id = Some(session_id);
        event
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(ChatEventKind::Assistant, Some(text.into()))
    }

    pub fn tool_use(name: impl Into<String>, id: impl Into<String>, input: Option<String>) -> Self {
        let mut event = Self::new(ChatEventKind::ToolUse, None);
        event.tool_name = Some(name.into());
        event.tool_id = Some(id.into());
        event.tool_input = input;
        event
    }

    pub fn tool_result(id: impl Into<String>, output: Option<String>) -> Self {
        let mut event = Self::new(ChatEventKind::ToolResult, output);
        event.tool_id = Some(id.into());
        event
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ChatEventKind::Error, Some(message.into()))
    }

    pub fn done() -> Self {
        Self::new(ChatEventKind::Done, None)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ChatEventKind::Done | ChatEventKind::Error)
    }
}

impl From<&SessionMessage> for ChatEvent {
    fn from(msg: &SessionMessage) -> Self {
        let kind = match msg.kind {
            MessageKind::User => ChatEventKind::User,
            MessageKind::Assistant => ChatEventKind::Assistant,
            MessageKind::System => ChatEventKind::System,
            MessageKind::ToolUse => ChatEventKind::ToolUse,
            MessageKind::ToolResult => ChatEventKind::ToolResult,
            MessageKind::Error => ChatEventKind::Error,
            MessageKind::Done => ChatEventKind::Done,
        };
        Self {
            kind,
            content: msg.content.clone(),
            tool_name: msg.tool_name.clone(),
            tool_id: msg.tool_id.clone(),
            tool_input: msg.tool_input.clone(),
            session_id: None,
            timestamp: msg.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Inbound control message from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Message {
        content: String,
        #[serde(default, rename = "sessionId")]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Interrupt,
}
