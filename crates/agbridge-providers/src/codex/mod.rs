pub mod discovery;
pub(crate) mod schema;
pub mod transcript;

pub use discovery::CodexProvider;
pub use transcript::parse_codex_rollout;
