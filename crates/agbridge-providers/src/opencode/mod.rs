pub mod discovery;
pub(crate) mod schema;
pub mod stream;
pub mod transcript;

pub use discovery::OpenCodeProvider;
pub use stream::OpenCodeStreamParser;
