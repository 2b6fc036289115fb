use std::fmt;

/// Result type for agbridge-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Session or workspace absent
    NotFound(String),

    /// Caller must fix state first (backend not available, empty name, ...)
    PreconditionFailed(String),

    /// A turn is already in flight on this chat session
    Busy,

    /// Backend produced no output at all
    NoResponse(String),

    /// Backend crashed or returned a malformed response (already sanitized)
    BackendFailure(String),

    /// Session monitor gave up on the backend
    Timeout(String),

    /// Configuration error
    Config(String),

    /// IO operation failed
    Io(std::io::Error),

    /// Provider layer error
    Provider(agbridge_providers::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::PreconditionFailed(msg) => write!(f, "Precondition failed: {}", msg),
            Error::Busy => write!(f, "A message is already being processed"),
            Error::NoResponse(msg) => write!(f, "No response: {}", msg),
            Error::BackendFailure(msg) => write!(f, "Backend failure: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Provider(err) => write!(f, "Provider error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl From<agbridge_providers::Error> for Error {
    fn from(err: agbridge_providers::Error) -> Self {
        Error::Provider(err)
    }
}

impl From<agbridge_core::Error> for Error {
    fn from(err: agbridge_core::Error) -> Self {
        match err {
            agbridge_core::Error::Io(err) => Error::Io(err),
            agbridge_core::Error::Config(msg) => Error::Config(msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
