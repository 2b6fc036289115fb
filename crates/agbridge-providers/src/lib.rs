// Error types
pub mod error;

// Storage access (local filesystem or container exec)
pub mod storage;

// Incremental line splitting for live backend output
pub mod line_buffer;

// Trait-based architecture (public API)
pub mod traits;

// Backend family implementations
pub mod claude;
pub mod codex;
pub mod opencode;

// Provider registry
pub mod registry;

// Traits
pub use traits::{RawSessionRef, SessionProvider, StreamParser, Transcript};

// Storage
pub use storage::{
    ContainerExec, ContainerStorage, DockerExec, ExecOutput, LocalStorage, SearchPattern, Storage,
    StorageEntry,
};

pub use line_buffer::LineBuffer;

// Providers and parsers
pub use claude::{ClaudeProvider, ClaudeStreamParser};
pub use codex::CodexProvider;
pub use opencode::{OpenCodeProvider, OpenCodeStreamParser};

// Registry
pub use registry::{
    create_provider, create_stream_parser, default_storage_root, get_all_providers,
    get_provider_metadata, ProviderMetadata,
};

// Error types
pub use error::{Error, Result};
