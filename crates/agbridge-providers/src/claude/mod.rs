pub mod discovery;
pub(crate) mod schema;
pub mod stream;
pub mod transcript;

pub use discovery::ClaudeProvider;
pub use stream::ClaudeStreamParser;
pub use transcript::parse_claude_transcript;
