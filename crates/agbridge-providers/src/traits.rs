use crate::Result;
use crate::storage::SearchPattern;
use agbridge_types::{
    AgentType, ChatEvent, DeleteOutcome, MessageKind, SearchHit, SessionDetail, SessionMessage,
    SessionSummary, preview,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a provider keeps a session. Opaque outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator(pub(crate) PathBuf);

/// A discovered session, before its transcript is read.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSessionRef {
    pub id: String,
    pub agent_type: AgentType,
    pub project_path: String,
    pub mtime: DateTime<Utc>,
    pub(crate) locator: Locator,
}

impl RawSessionRef {
    pub(crate) fn new(
        id: impl Into<String>,
        agent_type: AgentType,
        project_path: impl Into<String>,
        mtime: DateTime<Utc>,
        locator: PathBuf,
    ) -> Self {
        Self {
            id: id.into(),
            agent_type,
            project_path: project_path.into(),
            mtime,
            locator: Locator(locator),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.locator.0
    }
}

/// Meaningful messages of one session plus any name the backend declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub messages: Vec<SessionMessage>,
    pub declared_name: Option<String>,
}

impl Transcript {
    /// Append a message unless it is empty.
    pub fn push(&mut self, message: SessionMessage) {
        if message.is_meaningful() {
            self.messages.push(message);
        }
    }
}

/// Discovery and transcript access for one backend family.
///
/// Responsibilities:
/// - Scan the storage root for sessions (missing root = no sessions)
/// - Parse one session's storage into canonical messages
/// - Search and delete by session id
pub trait SessionProvider: Send + Sync {
    fn agent_type(&self) -> AgentType;

    fn storage_root(&self) -> &Path;

    fn discover(&self) -> Result<Vec<RawSessionRef>>;

    /// Read and normalize the transcript, dropping bookkeeping records.
    fn parse(&self, session: &RawSessionRef) -> Result<Transcript>;

    fn search(&self, pattern: &SearchPattern) -> Result<Vec<SearchHit>>;

    fn delete(&self, id: &str) -> Result<DeleteOutcome>;

    fn locate(&self, id: &str) -> Result<Option<RawSessionRef>> {
        Ok(self.discover()?.into_iter().find(|s| s.id == id))
    }

    fn get_detail(&self, session: &RawSessionRef) -> Result<SessionDetail> {
        let transcript = self.parse(session)?;
        Ok(SessionDetail {
            id: session.id.clone(),
            agent_type: session.agent_type,
            messages: transcript.messages,
        })
    }

    /// Summary derived from the same parse as `get_detail`, so the message
    /// count always matches the detail.
    fn summarize(&self, session: &RawSessionRef) -> Result<SessionSummary> {
        let transcript = self.parse(session)?;
        Ok(summary_from(session, &transcript))
    }
}

/// Incremental parser for one backend's live output, one line at a time.
///
/// Parsers are stateful per chat session: they remember the backend session
/// id and any tool ids they have announced.
pub trait StreamParser: Send {
    /// Zero or more events for one line. Malformed lines yield nothing.
    fn parse_line(&mut self, line: &str) -> Vec<ChatEvent>;

    /// Backend session id seen so far, if any.
    fn session_id(&self) -> Option<&str>;
}

pub(crate) fn summary_from(session: &RawSessionRef, transcript: &Transcript) -> SessionSummary {
    let latest_message = transcript
        .messages
        .iter()
        .filter_map(|m| m.timestamp)
        .max();
    let last_activity = latest_message.map_or(session.mtime, |t| t.max(session.mtime));
    let first_prompt_preview = transcript
        .messages
        .iter()
        .find(|m| m.kind == MessageKind::User)
        .and_then(|m| m.content.as_deref())
        .and_then(|c| preview(c, 200));

    SessionSummary {
        id: session.id.clone(),
        agent_type: session.agent_type,
        name: transcript.declared_name.clone(),
        project_path: session.project_path.clone(),
        message_count: transcript.messages.len(),
        last_activity,
        first_prompt_preview,
    }
}

/// Sum per-file match counts into per-session hits, highest count first.
pub(crate) fn aggregate_hits(
    agent_type: AgentType,
    matches: impl IntoIterator<Item = (String, usize)>,
) -> Vec<SearchHit> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (id, count) in matches {
        *counts.entry(id).or_default() += count;
    }
    let mut hits: Vec<SearchHit> = counts
        .into_iter()
        .map(|(id, match_count)| SearchHit {
            id,
            agent_type,
            match_count,
        })
        .collect();
    hits.sort_by(|a, b| b.match_count.cmp(&a.match_count).then_with(|| a.id.cmp(&b.id)));
    hits
}

pub(crate) fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Render a JSON tool payload as display text: strings verbatim, text-block
/// arrays joined, anything else serialized.
pub(crate) fn value_to_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect();
            if texts.len() == items.len() && !texts.is_empty() {
                Some(texts.join("\n"))
            } else {
                Some(value.to_string())
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")).as_deref(), Some("plain"));
        assert_eq!(
            value_to_text(&json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]))
                .as_deref(),
            Some("a\nb")
        );
        assert_eq!(value_to_text(&json!({"k": 1})).as_deref(), Some("{\"k\":1}"));
        assert_eq!(value_to_text(&json!(null)), None);
    }

    #[test]
    fn test_aggregate_hits_sums_per_session() {
        let hits = aggregate_hits(
            AgentType::RolloutLog,
            vec![("a".to_string(), 1), ("b".to_string(), 4), ("a".to_string(), 2)],
        );
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[1].match_count, 3);
    }
}
