use crate::claude::{ClaudeProvider, ClaudeStreamParser};
use crate::codex::CodexProvider;
use crate::opencode::{OpenCodeProvider, OpenCodeStreamParser};
use crate::storage::Storage;
use crate::traits::{SessionProvider, StreamParser};
use agbridge_core::expand_tilde;
use agbridge_types::AgentType;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub agent_type: AgentType,
    pub description: &'static str,
    pub default_storage_root: &'static str,
}

const PROVIDERS: &[ProviderMetadata] = &[
    ProviderMetadata {
        agent_type: AgentType::CliTranscript,
        description: "Claude Code",
        default_storage_root: "~/.claude/projects",
    },
    ProviderMetadata {
        agent_type: AgentType::PartStore,
        description: "OpenCode",
        default_storage_root: "~/.local/share/opencode/storage",
    },
    ProviderMetadata {
        agent_type: AgentType::RolloutLog,
        description: "Codex CLI",
        default_storage_root: "~/.codex/sessions",
    },
];

pub fn get_all_providers() -> &'static [ProviderMetadata] {
    PROVIDERS
}

pub fn get_provider_metadata(agent_type: AgentType) -> &'static ProviderMetadata {
    match agent_type {
        AgentType::CliTranscript => &PROVIDERS[0],
        AgentType::PartStore => &PROVIDERS[1],
        AgentType::RolloutLog => &PROVIDERS[2],
    }
}

/// Default storage root on the local host, with `~` expanded.
pub fn default_storage_root(agent_type: AgentType) -> PathBuf {
    expand_tilde(get_provider_metadata(agent_type).default_storage_root)
}

pub fn create_provider(
    agent_type: AgentType,
    storage: Arc<dyn Storage>,
    root: impl Into<PathBuf>,
) -> Box<dyn SessionProvider> {
    match agent_type {
        AgentType::CliTranscript => Box::new(ClaudeProvider::new(storage, root)),
        AgentType::PartStore => Box::new(OpenCodeProvider::new(storage, root)),
        AgentType::RolloutLog => Box::new(CodexProvider::new(storage, root)),
    }
}

/// Live-output parser, for the families that support live chat.
pub fn create_stream_parser(agent_type: AgentType) -> Option<Box<dyn StreamParser>> {
    match agent_type {
        AgentType::CliTranscript => Some(Box::new(ClaudeStreamParser::new())),
        AgentType::PartStore => Some(Box::new(OpenCodeStreamParser::new())),
        AgentType::RolloutLog => None,
    }
}
