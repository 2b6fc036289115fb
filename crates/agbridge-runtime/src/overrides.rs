use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// User-assigned display names for one workspace.
///
/// Persisted as `<data_dir>/names/<workspace_id>.json`, a JSON object mapping
/// session id to name. Every change is a fresh read-modify-write, so
/// concurrent writers resolve as last-write-wins.
#[derive(Debug, Clone)]
pub struct NameOverrideStore {
    path: PathBuf,
}

impl NameOverrideStore {
    pub fn new(data_dir: &Path, workspace_id: &str) -> Self {
        Self::at(data_dir.join("names").join(format!("{}.json", workspace_id)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn get(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(session_id))
    }

    pub fn set(&self, session_id: &str, name: &str) -> Result<()> {
        let mut names = self.load()?;
        names.insert(session_id.to_string(), name.to_string());
        self.save(&names)
    }

    /// Returns whether an override existed.
    pub fn clear(&self, session_id: &str) -> Result<bool> {
        let mut names = self.load()?;
        if names.remove(session_id).is_none() {
            return Ok(false);
        }
        self.save(&names)?;
        Ok(true)
    }

    fn save(&self, names: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(names)?)?;
        Ok(())
    }
}
