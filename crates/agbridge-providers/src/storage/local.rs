use super::{SearchPattern, Storage, StorageEntry, not_found};
use crate::Result;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Storage on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

fn entry_for(path: &Path, metadata: &fs::Metadata) -> StorageEntry {
    let modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);
    StorageEntry {
        path: path.to_path_buf(),
        is_dir: metadata.is_dir(),
        size: metadata.len(),
        modified,
    }
}

impl Storage for LocalStorage {
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            match entry.metadata() {
                Ok(metadata) => entries.push(entry_for(&entry.path(), &metadata)),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping unreadable entry");
                }
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn walk_files(&self, root: &Path, max_depth: usize) -> Result<Vec<StorageEntry>> {
        if !root.exists() {
            return Err(not_found(root));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) => entries.push(entry_for(entry.path(), &metadata)),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping unreadable file");
                }
            }
        }
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_first_line(&self, path: &Path) -> Result<Option<String>> {
        use std::io::{BufRead, BufReader};

        let file = fs::File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn remove(&self, path: &Path) -> Result<bool> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(true)
    }

    fn grep(&self, root: &Path, pattern: &SearchPattern) -> Result<Vec<(PathBuf, usize)>> {
        if !root.exists() {
            return Err(not_found(root));
        }

        let mut hits = Vec::new();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let text = match fs::read(entry.path()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping unreadable file during search");
                    continue;
                }
            };
            let count = text.lines().filter(|line| pattern.is_match(line)).count();
            if count > 0 {
                hits.push((entry.path().to_path_buf(), count));
            }
        }
        Ok(hits)
    }
}
