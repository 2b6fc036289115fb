use crate::Result;
use agbridge_types::AgentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub id: String,
    pub agent_type: AgentType,
    pub opened_at: DateTime<Utc>,
}

/// Recently opened sessions, most recent first, in `<data_dir>/recent.json`.
#[derive(Debug, Clone)]
pub struct RecentSessions {
    path: PathBuf,
    capacity: usize,
}

impl RecentSessions {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("recent.json"),
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn list(&self) -> Result<Vec<RecentEntry>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn touch(&self, id: &str, agent_type: AgentType) -> Result<()> {
        let mut entries = self.list()?;
        entries.retain(|e| e.id != id);
        entries.insert(
            0,
            RecentEntry {
                id: id.to_string(),
                agent_type,
                opened_at: Utc::now(),
            },
        );
        entries.truncate(self.capacity);
        self.save(&entries)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.list()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    fn save(&self, entries: &[RecentEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}
