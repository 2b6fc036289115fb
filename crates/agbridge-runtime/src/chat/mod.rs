mod backend;
mod sanitize;
mod session;

pub use backend::{ChatBackend, ClaudeChatBackend, OpenCodeChatBackend, create_chat_backend};
pub use sanitize::sanitize_error;
pub use session::{ChatOptions, ChatSession, HistorySource, TurnPhase};
