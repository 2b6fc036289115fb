use super::schema::RolloutRecord;
use super::transcript::parse_codex_rollout;
use crate::Result;
use crate::storage::{SearchPattern, Storage, StorageEntry, or_empty};
use crate::traits::{RawSessionRef, SessionProvider, Transcript, aggregate_hits};
use agbridge_types::{AgentType, DeleteOutcome, SearchHit};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// `<root>/YYYY/MM/DD/rollout-<timestamp>-<uuid>.jsonl`
const MAX_DEPTH: usize = 5;

static FILENAME_UUID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\.jsonl$")
        .ok()
});

/// Codex CLI rollout logs. Read-only to live chat; discovery only.
pub struct CodexProvider {
    storage: Arc<dyn Storage>,
    root: PathBuf,
}

/// Identity read from a rollout's first line.
struct RolloutHeader {
    id: String,
    cwd: String,
}

fn is_rollout(entry: &StorageEntry) -> bool {
    entry
        .file_name()
        .is_some_and(|name| name.starts_with("rollout-") && name.ends_with(".jsonl"))
}

fn id_from_filename(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let regex = FILENAME_UUID.as_ref()?;
    Some(regex.captures(name)?.get(1)?.as_str().to_lowercase())
}

impl CodexProvider {
    pub fn new(storage: Arc<dyn Storage>, root: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            root: root.into(),
        }
    }

    fn header(&self, path: &Path) -> Result<Option<RolloutHeader>> {
        let first_line = self.storage.read_first_line(path)?;
        let meta = first_line
            .as_deref()
            .and_then(|line| serde_json::from_str::<RolloutRecord>(line).ok())
            .and_then(|record| match record {
                RolloutRecord::SessionMeta(meta) => Some(meta.payload),
                _ => None,
            });

        let header = match meta {
            Some(payload) => Some(RolloutHeader {
                id: payload.id,
                cwd: payload.cwd.unwrap_or_default(),
            }),
            None => id_from_filename(path).map(|id| RolloutHeader {
                id,
                cwd: String::new(),
            }),
        };
        Ok(header)
    }
}

impl SessionProvider for CodexProvider {
    fn agent_type(&self) -> AgentType {
        AgentType::RolloutLog
    }

    fn storage_root(&self) -> &Path {
        &self.root
    }

    fn discover(&self) -> Result<Vec<RawSessionRef>> {
        let files = or_empty(self.storage.walk_files(&self.root, MAX_DEPTH))?;

        let mut sessions = Vec::new();
        for entry in files {
            if entry.size == 0 || !is_rollout(&entry) {
                continue;
            }
            let header = match self.header(&entry.path) {
                Ok(Some(header)) => header,
                Ok(None) => {
                    tracing::debug!(path = %entry.path.display(), "rollout without session id");
                    continue;
                }
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            sessions.push(RawSessionRef::new(
                header.id,
                AgentType::RolloutLog,
                header.cwd,
                entry.modified,
                entry.path,
            ));
        }

        tracing::debug!(root = %self.root.display(), count = sessions.len(), "discovered codex sessions");
        Ok(sessions)
    }

    fn parse(&self, session: &RawSessionRef) -> Result<Transcript> {
        let text = self.storage.read_to_string(session.path())?;
        Ok(parse_codex_rollout(&text))
    }

    fn search(&self, pattern: &SearchPattern) -> Result<Vec<SearchHit>> {
        let matches = or_empty(self.storage.grep(&self.root, pattern))?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        // Same id resolution as discover, without re-reading every header.
        let ids: HashMap<PathBuf, String> = self
            .discover()?
            .into_iter()
            .map(|s| (s.path().to_path_buf(), s.id))
            .collect();

        Ok(aggregate_hits(
            AgentType::RolloutLog,
            matches
                .into_iter()
                .filter_map(|(path, count)| Some((ids.get(&path)?.clone(), count))),
        ))
    }

    fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let Some(session) = self.locate(id)? else {
            return Ok(DeleteOutcome::not_found(id));
        };
        if !self.storage.remove(session.path())? {
            return Ok(DeleteOutcome::not_found(id));
        }
        tracing::debug!(id, "deleted codex session");
        Ok(DeleteOutcome::deleted())
    }
}
