use serde::Deserialize;
use serde_json::Value;

/// One line of a `rollout-*.jsonl` file.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum RolloutRecord {
    SessionMeta(SessionMetaRecord),
    ResponseItem(ResponseItemRecord),
    // event_msg repeats response items for the TUI; turn_context is config
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SessionMetaRecord {
    pub payload: SessionMetaPayload,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SessionMetaPayload {
    pub id: String,
    #[serde(default)]
    pub cwd: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ResponseItemRecord {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub payload: ResponseItem,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum ResponseItem {
    Message {
        role: String,
        #[serde(default)]
        content: Vec<MessageContent>,
    },
    FunctionCall {
        name: String,
        #[serde(default)]
        arguments: String,
        call_id: String,
    },
    FunctionCallOutput {
        call_id: String,
        #[serde(default)]
        output: Value,
    },
    CustomToolCall {
        name: String,
        #[serde(default)]
        input: String,
        call_id: String,
    },
    CustomToolCallOutput {
        call_id: String,
        #[serde(default)]
        output: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum MessageContent {
    InputText {
        text: String,
    },
    OutputText {
        text: String,
    },
    #[serde(other)]
    Unknown,
}
