use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend family a session belongs to.
///
/// Each family has its own on-disk layout and (optionally) its own streaming
/// grammar:
/// - `cli-transcript`: Claude Code, one JSONL transcript per session
/// - `part-store`: OpenCode, session/message/part JSON object tree
/// - `rollout-log`: Codex, append-only rollout logs (discovery only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    CliTranscript,
    PartStore,
    RolloutLog,
}

impl AgentType {
    /// Fixed preference order used when a lookup does not name a family.
    pub const ALL: [AgentType; 3] = [
        AgentType::CliTranscript,
        AgentType::PartStore,
        AgentType::RolloutLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::CliTranscript => "cli-transcript",
            AgentType::PartStore => "part-store",
            AgentType::RolloutLog => "rollout-log",
        }
    }

    /// Whether this family can hold a live chat turn.
    pub fn supports_live_chat(&self) -> bool {
        !matches!(self, AgentType::RolloutLog)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cli-transcript" | "claude" | "claude_code" => Ok(AgentType::CliTranscript),
            "part-store" | "opencode" => Ok(AgentType::PartStore),
            "rollout-log" | "codex" => Ok(AgentType::RolloutLog),
            other => Err(format!("Unknown agent type: {}", other)),
        }
    }
}

/// Session summary for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub agent_type: AgentType,
    pub name: Option<String>,
    pub project_path: String,
    pub message_count: usize,
    pub last_activity: DateTime<Utc>,
    /// First user prompt, whitespace-collapsed, at most 200 chars.
    pub first_prompt_preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    System,
    ToolUse,
    ToolResult,
    Error,
    Done,
}

/// One canonical message of a stored transcript.
///
/// `tool_use` and `tool_result` share `tool_id`; consumers pair them by value,
/// never by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<String>,
}

impl SessionMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: Some(content.into()),
            timestamp: None,
            tool_name: None,
            tool_id: None,
            tool_input: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Assistant, content)
    }

    pub fn tool_use(name: impl Into<String>, id: impl Into<String>, input: Option<String>) -> Self {
        Self {
            kind: MessageKind::ToolUse,
            content: None,
            timestamp: None,
            tool_name: Some(name.into()),
            tool_id: Some(id.into()),
            tool_input: input,
        }
    }

    pub fn tool_result(id: impl Into<String>, content: Option<String>) -> Self {
        Self {
            kind: MessageKind::ToolResult,
            content,
            timestamp: None,
            tool_name: None,
            tool_id: Some(id.into()),
            tool_input: None,
        }
    }

    pub fn at(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_tool_name(mut self, name: Option<String>) -> Self {
        self.tool_name = name;
        self
    }

    /// A message carries something worth showing: text, or a tool reference.
    pub fn is_meaningful(&self) -> bool {
        match self.kind {
            MessageKind::ToolUse | MessageKind::ToolResult => self.tool_id.is_some(),
            _ => self
                .content
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty()),
        }
    }
}

/// Full transcript of one session, in storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: String,
    pub agent_type: AgentType,
    pub messages: Vec<SessionMessage>,
}

/// One paginated slice of the merged session listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPage {
    pub total: usize,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub agent_type: AgentType,
    pub match_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeleteOutcome {
    pub fn deleted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn not_found(id: &str) -> Self {
        Self {
            success: false,
            error: Some(format!("Session not found: {}", id)),
        }
    }
}
