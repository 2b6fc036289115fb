pub mod chat;
pub mod session;
mod util;

pub use chat::*;
pub use session::*;
pub use util::*;
