use crate::config::ChatConfig;
use crate::monitor::MonitorConfig;
use crate::process::Invocation;
use crate::{Error, Result};
use agbridge_providers::{ClaudeStreamParser, OpenCodeStreamParser, StreamParser};
use agbridge_types::AgentType;
use std::path::PathBuf;
use std::sync::Arc;

/// How to run one turn against a live-chat backend family.
pub trait ChatBackend: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Command line for one turn, resuming `session_id` when given.
    fn build_invocation(
        &self,
        text: &str,
        session_id: Option<&str>,
        model: Option<&str>,
    ) -> Invocation;

    /// Fresh parser for one turn's output.
    fn new_parser(&self) -> Box<dyn StreamParser>;

    fn monitor_config(&self) -> MonitorConfig;
}

/// `claude -p --output-format stream-json`
#[derive(Debug, Clone)]
pub struct ClaudeChatBackend {
    config: ChatConfig,
    cwd: Option<PathBuf>,
}

impl ClaudeChatBackend {
    pub fn new(config: ChatConfig, cwd: Option<PathBuf>) -> Self {
        Self { config, cwd }
    }
}

impl ChatBackend for ClaudeChatBackend {
    fn agent_type(&self) -> AgentType {
        AgentType::CliTranscript
    }

    fn build_invocation(
        &self,
        text: &str,
        session_id: Option<&str>,
        model: Option<&str>,
    ) -> Invocation {
        let mut argv: Vec<String> = [
            self.config.binary.as_str(),
            "-p",
            "--output-format",
            "stream-json",
            "--verbose",
            "--include-partial-messages",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(id) = session_id {
            argv.extend(["--resume".to_string(), id.to_string()]);
        }
        if let Some(model) = model {
            argv.extend(["--model".to_string(), model.to_string()]);
        }
        argv.extend(self.config.extra_args.iter().cloned());
        argv.extend(["--".to_string(), text.to_string()]);

        Invocation {
            argv,
            cwd: self.cwd.clone(),
            env: Vec::new(),
        }
    }

    fn new_parser(&self) -> Box<dyn StreamParser> {
        Box::new(ClaudeStreamParser::new())
    }

    fn monitor_config(&self) -> MonitorConfig {
        self.config.monitor_config()
    }
}

/// `opencode run --format json`
#[derive(Debug, Clone)]
pub struct OpenCodeChatBackend {
    config: ChatConfig,
    cwd: Option<PathBuf>,
}

impl OpenCodeChatBackend {
    pub fn new(config: ChatConfig, cwd: Option<PathBuf>) -> Self {
        Self { config, cwd }
    }
}

impl ChatBackend for OpenCodeChatBackend {
    fn agent_type(&self) -> AgentType {
        AgentType::PartStore
    }

    fn build_invocation(
        &self,
        text: &str,
        session_id: Option<&str>,
        model: Option<&str>,
    ) -> Invocation {
        let mut argv = vec![
            self.config.binary.clone(),
            "run".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        if let Some(id) = session_id {
            argv.extend(["--session".to_string(), id.to_string()]);
        }
        if let Some(model) = model {
            argv.extend(["--model".to_string(), model.to_string()]);
        }
        argv.extend(self.config.extra_args.iter().cloned());
        argv.extend(["--".to_string(), text.to_string()]);

        Invocation {
            argv,
            cwd: self.cwd.clone(),
            env: Vec::new(),
        }
    }

    fn new_parser(&self) -> Box<dyn StreamParser> {
        Box::new(OpenCodeStreamParser::new())
    }

    fn monitor_config(&self) -> MonitorConfig {
        self.config.monitor_config()
    }
}

pub fn create_chat_backend(
    agent_type: AgentType,
    config: ChatConfig,
    cwd: Option<PathBuf>,
) -> Result<Arc<dyn ChatBackend>> {
    match agent_type {
        AgentType::CliTranscript => Ok(Arc::new(ClaudeChatBackend::new(config, cwd))),
        AgentType::PartStore => Ok(Arc::new(OpenCodeChatBackend::new(config, cwd))),
        AgentType::RolloutLog => Err(Error::PreconditionFailed(format!(
            "{} sessions are read-only; live chat is not supported",
            agent_type
        ))),
    }
}
