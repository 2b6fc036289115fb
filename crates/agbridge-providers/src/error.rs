use std::fmt;

/// Result type for agbridge-providers operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the providers layer
#[derive(Debug)]
pub enum Error {
    /// IO operation failed (a missing path surfaces as `ErrorKind::NotFound`)
    Io(std::io::Error),

    /// JSON parsing failed
    Json(serde_json::Error),

    /// Walkdir error
    WalkDir(walkdir::Error),

    /// Search pattern did not compile
    Regex(regex::Error),

    /// Container exec round trip failed or returned an unexpected status
    Exec(String),

    /// Session parsing failed (missing required fields, invalid format, etc.)
    Parse(String),

    /// Provider not found or misconfigured
    Provider(String),
}

impl Error {
    /// Whether this error means "the thing is not there" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            Error::WalkDir(err) => err
                .io_error()
                .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::WalkDir(err) => write!(f, "Directory traversal error: {}", err),
            Error::Regex(err) => write!(f, "Invalid search pattern: {}", err),
            Error::Exec(msg) => write!(f, "Container exec error: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Provider(msg) => write!(f, "Provider error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Regex(err) => Some(err),
            Error::Exec(_) | Error::Parse(_) | Error::Provider(_) => None,
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
        Error::Json(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}
