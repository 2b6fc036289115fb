use super::transcript::parse_claude_transcript;
use crate::Result;
use crate::storage::{SearchPattern, Storage, or_empty};
use crate::traits::{RawSessionRef, SessionProvider, Transcript, aggregate_hits};
use agbridge_core::decode_project_dir;
use agbridge_types::{AgentType, DeleteOutcome, SearchHit};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Claude Code transcripts: `<root>/<encoded-project>/<session-id>.jsonl`.
pub struct ClaudeProvider {
    storage: Arc<dyn Storage>,
    root: PathBuf,
}

impl ClaudeProvider {
    pub fn new(storage: Arc<dyn Storage>, root: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            root: root.into(),
        }
    }

    /// Map a path under the root to `(session_id, project_path)`.
    ///
    /// Only `<project-dir>/<id>.jsonl` qualifies; subagent logs
    /// (`agent-*.jsonl`) and deeper files do not.
    fn session_for_path(&self, path: &Path) -> Option<(String, String)> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let project_dir = components.next()?.as_os_str().to_str()?;
        let file = components.next()?.as_os_str().to_str()?;
        if components.next().is_some() {
            return None;
        }
        let id = file.strip_suffix(".jsonl")?;
        if id.is_empty() || id.starts_with("agent-") {
            return None;
        }
        Some((id.to_string(), decode_project_dir(project_dir)))
    }
}

impl SessionProvider for ClaudeProvider {
    fn agent_type(&self) -> AgentType {
        AgentType::CliTranscript
    }

    fn storage_root(&self) -> &Path {
        &self.root
    }

    fn discover(&self) -> Result<Vec<RawSessionRef>> {
        let files = or_empty(self.storage.walk_files(&self.root, 2))?;

        let sessions: Vec<RawSessionRef> = files
            .into_iter()
            .filter(|entry| entry.size > 0)
            .filter_map(|entry| {
                let (id, project_path) = self.session_for_path(&entry.path)?;
                Some(RawSessionRef::new(
                    id,
                    AgentType::CliTranscript,
                    project_path,
                    entry.modified,
                    entry.path,
                ))
            })
            .collect();

        tracing::debug!(root = %self.root.display(), count = sessions.len(), "discovered claude sessions");
        Ok(sessions)
    }

    fn parse(&self, session: &RawSessionRef) -> Result<Transcript> {
        let text = self.storage.read_to_string(session.path())?;
        Ok(parse_claude_transcript(&text))
    }

    fn search(&self, pattern: &SearchPattern) -> Result<Vec<SearchHit>> {
        let matches = or_empty(self.storage.grep(&self.root, pattern))?;
        Ok(aggregate_hits(
            AgentType::CliTranscript,
            matches
                .into_iter()
                .filter_map(|(path, count)| Some((self.session_for_path(&path)?.0, count))),
        ))
    }

    fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let Some(session) = self.locate(id)? else {
            return Ok(DeleteOutcome::not_found(id));
        };

        if !self.storage.remove(session.path())? {
            return Ok(DeleteOutcome::not_found(id));
        }
        // Per-session side directory (subagent logs, tool output spill files)
        if let Some(parent) = session.path().parent() {
            self.storage.remove(&parent.join(id))?;
        }

        tracing::debug!(id, "deleted claude session");
        Ok(DeleteOutcome::deleted())
    }
}
