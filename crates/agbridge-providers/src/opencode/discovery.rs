use super::schema::{MessageInfo, PartInfo, SessionInfo};
use super::transcript::{push_message, sort_messages};
use crate::Result;
use crate::storage::{SearchPattern, Storage, or_empty};
use crate::traits::{RawSessionRef, SessionProvider, Transcript, aggregate_hits, from_millis};
use agbridge_types::{AgentType, DeleteOutcome, SearchHit};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// OpenCode storage: one JSON object per session, message and part.
///
/// ```text
/// <root>/session/<projectID>/<sessionID>.json
/// <root>/message/<sessionID>/<messageID>.json
/// <root>/part/<messageID>/<partID>.json
/// ```
pub struct OpenCodeProvider {
    storage: Arc<dyn Storage>,
    root: PathBuf,
}

/// What a matched path under the root belongs to.
enum StoragePath {
    Session(String),
    Message(String),
    Part(String),
}

impl OpenCodeProvider {
    pub fn new(storage: Arc<dyn Storage>, root: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            root: root.into(),
        }
    }

    fn session_dir(&self) -> PathBuf {
        self.root.join("session")
    }

    fn message_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("message").join(session_id)
    }

    fn part_dir(&self, message_id: &str) -> PathBuf {
        self.root.join("part").join(message_id)
    }

    /// Read one JSON object; malformed files are skipped.
    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let text = self.storage.read_to_string(path)?;
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping malformed opencode record");
                Ok(None)
            }
        }
    }

    /// JSON objects directly inside `dir`, in file-name order.
    fn read_children<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        let mut entries = or_empty(self.storage.list_dir(dir))?;
        entries.retain(|e| !e.is_dir && e.has_extension("json"));
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.read_json(&entry.path) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(items)
    }

    fn classify(&self, path: &Path) -> Option<StoragePath> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        let [kind, dir, file] = parts.as_slice() else {
            return None;
        };
        let stem = file.strip_suffix(".json")?;
        match *kind {
            "session" => Some(StoragePath::Session(stem.to_string())),
            "message" => Some(StoragePath::Message((*dir).to_string())),
            "part" => Some(StoragePath::Part((*dir).to_string())),
            _ => None,
        }
    }

    fn session_for_part(&self, path: &Path) -> Option<String> {
        match self.read_json::<PartInfo>(path) {
            Ok(part) => part?.session_id,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "unreadable part during search");
                None
            }
        }
    }
}

impl SessionProvider for OpenCodeProvider {
    fn agent_type(&self) -> AgentType {
        AgentType::PartStore
    }

    fn storage_root(&self) -> &Path {
        &self.root
    }

    fn discover(&self) -> Result<Vec<RawSessionRef>> {
        let files = or_empty(self.storage.walk_files(&self.session_dir(), 2))?;

        let mut sessions = Vec::new();
        for entry in files {
            if entry.size == 0 || !entry.has_extension("json") {
                continue;
            }
            let info: SessionInfo = match self.read_json(&entry.path) {
                Ok(Some(info)) => info,
                Ok(None) => continue,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            let mtime = info
                .time
                .updated
                .or(info.time.created)
                .and_then(from_millis)
                .map_or(entry.modified, |t| t.max(entry.modified));
            sessions.push(RawSessionRef::new(
                info.id,
                AgentType::PartStore,
                info.directory.unwrap_or_default(),
                mtime,
                entry.path,
            ));
        }

        tracing::debug!(root = %self.root.display(), count = sessions.len(), "discovered opencode sessions");
        Ok(sessions)
    }

    fn parse(&self, session: &RawSessionRef) -> Result<Transcript> {
        let info: Option<SessionInfo> = self.read_json(session.path())?;
        let mut messages: Vec<MessageInfo> = self.read_children(&self.message_dir(&session.id))?;
        sort_messages(&mut messages);

        let mut transcript = Transcript {
            declared_name: info.and_then(|i| i.title).filter(|t| !t.trim().is_empty()),
            ..Transcript::default()
        };
        for message in &messages {
            let mut parts: Vec<PartInfo> = self.read_children(&self.part_dir(&message.id))?;
            parts.sort_by(|a, b| a.id.cmp(&b.id));
            push_message(&mut transcript, message, &parts);
        }
        Ok(transcript)
    }

    fn search(&self, pattern: &SearchPattern) -> Result<Vec<SearchHit>> {
        let matches = or_empty(self.storage.grep(&self.root, pattern))?;

        // Parts only know their message; resolve each message once.
        let mut part_sessions: HashMap<String, Option<String>> = HashMap::new();
        let mut hits = Vec::new();
        for (path, count) in matches {
            let session_id = match self.classify(&path) {
                Some(StoragePath::Session(id)) | Some(StoragePath::Message(id)) => Some(id),
                Some(StoragePath::Part(message_id)) => part_sessions
                    .entry(message_id)
                    .or_insert_with(|| self.session_for_part(&path))
                    .clone(),
                None => None,
            };
            if let Some(id) = session_id {
                hits.push((id, count));
            }
        }
        Ok(aggregate_hits(AgentType::PartStore, hits))
    }

    fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let Some(session) = self.locate(id)? else {
            return Ok(DeleteOutcome::not_found(id));
        };

        let message_dir = self.message_dir(id);
        for entry in or_empty(self.storage.list_dir(&message_dir))? {
            if let Some(message_id) = entry.file_stem() {
                self.storage.remove(&self.part_dir(message_id))?;
            }
        }
        self.storage.remove(&message_dir)?;

        if !self.storage.remove(session.path())? {
            return Ok(DeleteOutcome::not_found(id));
        }

        tracing::debug!(id, "deleted opencode session");
        Ok(DeleteOutcome::deleted())
    }
}
