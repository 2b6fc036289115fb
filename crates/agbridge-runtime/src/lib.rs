pub mod chat;
pub mod config;
pub mod error;
pub mod facade;
pub mod monitor;
pub mod overrides;
pub mod process;
pub mod recent;

pub use chat::{
    ChatBackend, ChatOptions, ChatSession, ClaudeChatBackend, HistorySource, OpenCodeChatBackend,
    TurnPhase, create_chat_backend, sanitize_error,
};
pub use config::{ChatConfig, Config, ContainerConfig, ProviderConfig};
pub use error::{Error, Result};
pub use facade::SessionFacade;
pub use monitor::{Clock, ManualClock, MonitorConfig, MonitorFailure, SessionMonitor, SystemClock};
pub use overrides::NameOverrideStore;
pub use process::{
    ContainerSpawner, Invocation, ProcessControl, ProcessSpawner, SpawnedProcess, TokioSpawner,
};
pub use recent::{RecentEntry, RecentSessions};
