use agbridge_providers::{LocalStorage, SearchPattern, Storage, StorageEntry, create_provider};
use agbridge_runtime::{Error, HistorySource, NameOverrideStore, RecentSessions, SessionFacade};
use agbridge_types::{AgentType, MessageKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn user_line(ts: &str, text: &str) -> String {
    format!(
        "{{\"type\":\"user\",\"timestamp\":\"{ts}\",\"message\":{{\"role\":\"user\",\"content\":\"{text}\"}}}}\n"
    )
}

struct Fixture {
    _dir: TempDir,
    facade: SessionFacade,
    claude_root: std::path::PathBuf,
}

/// Claude: `old` (2024), `new` (2025, named), `blank` (bookkeeping only).
/// Codex: one rollout sharing no ids with Claude.
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let claude_root = dir.path().join("claude");
    let codex_root = dir.path().join("codex");
    let data_dir = dir.path().join("data");

    write(
        &claude_root.join("-work-app/old.jsonl"),
        &user_line("2024-03-01T10:00:00Z", "old question about parsing"),
    );
    write(
        &claude_root.join("-work-app/new.jsonl"),
        &format!(
            "{{\"type\":\"summary\",\"summary\":\"Parser rewrite\"}}\n{}",
            user_line("2030-01-01T10:00:00Z", "new question about parsing")
        ),
    );
    write(
        &claude_root.join("-work-app/blank.jsonl"),
        "{\"type\":\"file-history-snapshot\",\"messageId\":\"m\"}\n",
    );
    write(
        &codex_root.join("2025/02/01/rollout-2025-02-01T00-00-00-0199a1b2-0000-7000-8000-0000000000cc.jsonl"),
        concat!(
            "{\"timestamp\":\"2025-02-01T00:00:00Z\",\"type\":\"session_meta\",\"payload\":{\"id\":\"cx-1\",\"cwd\":\"/work/cli\"}}\n",
            "{\"timestamp\":\"2025-02-01T00:00:01Z\",\"type\":\"response_item\",\"payload\":{\"type\":\"message\",\"role\":\"user\",\"content\":[{\"type\":\"input_text\",\"text\":\"parsing parsing parsing\"}]}}\n",
        ),
    );

    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new());
    let facade = SessionFacade::new(
        vec![
            create_provider(AgentType::CliTranscript, storage.clone(), &claude_root),
            create_provider(AgentType::PartStore, storage.clone(), dir.path().join("absent")),
            create_provider(AgentType::RolloutLog, storage, &codex_root),
        ],
        NameOverrideStore::new(&data_dir, "ws"),
        RecentSessions::new(&data_dir),
    );
    Fixture {
        _dir: dir,
        facade,
        claude_root,
    }
}

#[test]
fn test_list_merges_sorts_and_skips_empty() {
    let fx = fixture();
    let page = fx.facade.list(None, 10, 0).unwrap();
    let ids: Vec<&str> = page.sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(page.total, 3);
    assert_eq!(ids[0], "new");
    assert!(ids.contains(&"old"));
    assert!(ids.contains(&"cx-1"));
    assert!(!ids.contains(&"blank"));
    assert_eq!(page.sessions[0].name.as_deref(), Some("Parser rewrite"));

    let page = fx.facade.list(Some(AgentType::RolloutLog), 10, 0).unwrap();
    assert_eq!(page.total, 1);

    let page = fx.facade.list(None, 1, 1).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.sessions.len(), 1);
}

#[test]
fn test_rename_and_clear_round_trip() {
    let fx = fixture();
    fx.facade.rename("old", "  Legacy work ").unwrap();
    let page = fx.facade.list(None, 10, 0).unwrap();
    let old = page.sessions.iter().find(|s| s.id == "old").unwrap();
    assert_eq!(old.name.as_deref(), Some("Legacy work"));

    fx.facade.rename("new", "Override").unwrap();
    fx.facade.clear_name("new").unwrap();
    let page = fx.facade.list(None, 10, 0).unwrap();
    let new = page.sessions.iter().find(|s| s.id == "new").unwrap();
    assert_eq!(new.name.as_deref(), Some("Parser rewrite"));

    assert!(matches!(
        fx.facade.rename("old", "   "),
        Err(Error::PreconditionFailed(_))
    ));
}

#[test]
fn test_get_prefers_first_matching_provider() {
    let fx = fixture();
    let detail = fx.facade.get("new", None).unwrap();
    assert_eq!(detail.agent_type, AgentType::CliTranscript);
    assert_eq!(detail.messages[0].kind, MessageKind::User);

    assert!(matches!(fx.facade.get("blank", None), Err(Error::NotFound(_))));
    assert!(matches!(
        fx.facade.get("new", Some(AgentType::RolloutLog)),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(fx.facade.get("nope", None), Err(Error::NotFound(_))));

    let history = fx.facade.history(AgentType::RolloutLog, "cx-1").unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn test_search_across_providers() {
    let fx = fixture();
    let hits = fx
        .facade
        .search(&SearchPattern::literal("parsing").unwrap(), None)
        .unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].match_count >= w[1].match_count));
}

#[test]
fn test_delete_clears_override_and_recent() {
    let fx = fixture();
    fx.facade.rename("old", "Doomed").unwrap();
    fx.facade.touch_recent("old", AgentType::CliTranscript).unwrap();
    fx.facade.touch_recent("new", AgentType::CliTranscript).unwrap();

    let outcome = fx.facade.delete("old", None).unwrap();
    assert!(outcome.success);
    assert!(!fx.claude_root.join("-work-app/old.jsonl").exists());
    let recent: Vec<String> = fx.facade.recent().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(recent, vec!["new"]);

    // Provider no longer knows it; bookkeeping is still cleared.
    fx.facade.rename("old", "Ghost").unwrap();
    fx.facade.touch_recent("old", AgentType::CliTranscript).unwrap();
    let outcome = fx.facade.delete("old", None).unwrap();
    assert!(!outcome.success);
    let page = fx.facade.list(None, 10, 0).unwrap();
    assert!(page.sessions.iter().all(|s| s.id != "old"));
    assert_eq!(fx.facade.recent().unwrap().len(), 1);
}

/// Listings work but every transcript read fails, as when a file vanishes
/// between discovery and the read.
struct UnreadableStorage(LocalStorage);

impl Storage for UnreadableStorage {
    fn list_dir(&self, dir: &Path) -> agbridge_providers::Result<Vec<StorageEntry>> {
        self.0.list_dir(dir)
    }

    fn walk_files(
        &self,
        root: &Path,
        max_depth: usize,
    ) -> agbridge_providers::Result<Vec<StorageEntry>> {
        self.0.walk_files(root, max_depth)
    }

    fn read_to_string(&self, path: &Path) -> agbridge_providers::Result<String> {
        Err(agbridge_providers::Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("cannot read {}", path.display()),
        )))
    }

    fn read_first_line(&self, path: &Path) -> agbridge_providers::Result<Option<String>> {
        self.0.read_first_line(path)
    }

    fn remove(&self, path: &Path) -> agbridge_providers::Result<bool> {
        self.0.remove(path)
    }

    fn grep(
        &self,
        root: &Path,
        pattern: &SearchPattern,
    ) -> agbridge_providers::Result<Vec<(PathBuf, usize)>> {
        self.0.grep(root, pattern)
    }
}

#[test]
fn test_get_skips_provider_whose_read_fails() {
    let fx = fixture();
    let data_dir = fx._dir.path().join("data");
    let failing: Arc<dyn Storage> = Arc::new(UnreadableStorage(LocalStorage::new()));
    let local: Arc<dyn Storage> = Arc::new(LocalStorage::new());

    let facade = SessionFacade::new(
        vec![
            create_provider(AgentType::CliTranscript, failing.clone(), &fx.claude_root),
            create_provider(AgentType::CliTranscript, local, &fx.claude_root),
        ],
        NameOverrideStore::new(&data_dir, "ws"),
        RecentSessions::new(&data_dir),
    );
    let detail = facade.get("new", None).unwrap();
    assert_eq!(detail.messages.len(), 1);

    let only_failing = SessionFacade::new(
        vec![create_provider(AgentType::CliTranscript, failing, &fx.claude_root)],
        NameOverrideStore::new(&data_dir, "ws"),
        RecentSessions::new(&data_dir),
    );
    assert!(matches!(only_failing.get("new", None), Err(Error::NotFound(_))));
}
