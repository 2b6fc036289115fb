use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct TimeInfo {
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub updated: Option<i64>,
}

/// `storage/session/<projectID>/<sessionID>.json`
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub time: TimeInfo,
}

/// `storage/message/<sessionID>/<messageID>.json`
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct MessageInfo {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub time: TimeInfo,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct ToolState {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `storage/part/<messageID>/<partID>.json`
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct PartInfo {
    pub id: String,
    #[serde(default, rename = "sessionID")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default, rename = "callID")]
    pub call_id: Option<String>,
    #[serde(default)]
    pub state: Option<ToolState>,
}

/// One line of `opencode run --format json` output.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct StreamLine {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, rename = "sessionID")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub part: Option<StreamPart>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct StreamPart {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "callID")]
    pub call_id: Option<String>,
    #[serde(default)]
    pub state: Option<ToolState>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
}

impl StreamPart {
    pub fn tool_id(&self) -> Option<&str> {
        self.call_id.as_deref().or(self.id.as_deref())
    }

    pub fn tool_name(&self) -> &str {
        self.tool
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("tool")
    }

    pub fn input(&self) -> Option<&Value> {
        self.state
            .as_ref()
            .and_then(|s| s.input.as_ref())
            .or(self.input.as_ref())
            .filter(|v| !v.is_null())
    }

    pub fn output(&self) -> Option<&Value> {
        self.state
            .as_ref()
            .and_then(|s| s.output.as_ref())
            .or(self.output.as_ref())
            .filter(|v| !v.is_null())
    }

    /// Short human label the backend gives a running tool.
    pub fn title(&self) -> Option<&str> {
        self.state
            .as_ref()
            .and_then(|s| s.title.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn error(&self) -> Option<&str> {
        let state = self.state.as_ref()?;
        if state.status.as_deref() == Some("error") {
            return Some(state.error.as_deref().unwrap_or("Tool failed"));
        }
        None
    }
}
