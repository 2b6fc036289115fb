use crate::monitor::MonitorConfig;
use crate::{Error, Result};
use agbridge_core::{expand_tilde, resolve_data_dir};
use agbridge_providers::default_storage_root;
use agbridge_types::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_workspace_id() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub storage_root: PathBuf,
}

/// Run discovery and chat inside a container via `docker exec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub binary: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    pub operation_timeout_ms: u64,
    pub initial_response_timeout_ms: u64,
    /// 0 disables heartbeat checking.
    #[serde(default)]
    pub activity_timeout_ms: u64,
}

impl ChatConfig {
    pub fn default_for(agent_type: AgentType) -> Self {
        let (binary, initial_response_timeout_ms) = match agent_type {
            AgentType::CliTranscript => ("claude", 120_000),
            AgentType::PartStore => ("opencode", 90_000),
            AgentType::RolloutLog => ("codex", 120_000),
        };
        Self {
            binary: binary.to_string(),
            extra_args: Vec::new(),
            operation_timeout_ms: 600_000,
            initial_response_timeout_ms,
            activity_timeout_ms: 0,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            initial_response_timeout: Duration::from_millis(self.initial_response_timeout_ms),
            activity_timeout: Duration::from_millis(self.activity_timeout_ms),
        }
    }
}

/// Sections are keyed by agent type name (`cli-transcript`, `part-store`,
/// `rollout-log`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerConfig>,
    #[serde(default)]
    pub chat: BTreeMap<String, ChatConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_id: default_workspace_id(),
            providers: BTreeMap::new(),
            container: None,
            chat: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(resolve_data_dir(None)?.join("config.toml"))
    }

    /// Enable every family whose default storage root exists on this host.
    pub fn detect() -> Self {
        let mut providers = BTreeMap::new();

        for agent in AgentType::ALL {
            let root = default_storage_root(agent);
            if root.exists() {
                providers.insert(
                    agent.as_str().to_string(),
                    ProviderConfig {
                        enabled: true,
                        storage_root: root,
                    },
                );
            }
        }

        Config {
            providers,
            ..Config::default()
        }
    }

    fn validate(&self) -> Result<()> {
        for key in self.providers.keys().chain(self.chat.keys()) {
            key.parse::<AgentType>()
                .map_err(|_| Error::Config(format!("Unknown agent type in config: {}", key)))?;
        }
        if self.workspace_id.trim().is_empty() {
            return Err(Error::Config("workspace_id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Storage roots of the enabled families, in preference order.
    ///
    /// With no `[providers]` section every family is enabled at its default root.
    pub fn enabled_providers(&self) -> Vec<(AgentType, PathBuf)> {
        AgentType::ALL
            .into_iter()
            .filter_map(|agent| {
                if self.providers.is_empty() {
                    return Some((agent, default_storage_root(agent)));
                }
                let provider = self.providers.get(agent.as_str())?;
                let root = expand_tilde(&provider.storage_root.to_string_lossy());
                provider.enabled.then_some((agent, root))
            })
            .collect()
    }

    pub fn chat_config(&self, agent_type: AgentType) -> ChatConfig {
        self.chat
            .get(agent_type.as_str())
            .cloned()
            .unwrap_or_else(|| ChatConfig::default_for(agent_type))
    }
}
