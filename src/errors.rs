//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// A session's private storage area could not be created.
    SessionInit(String),
    /// The session has been destroyed; no further executions are accepted.
    SessionGone(String),
    /// The execution deadline elapsed and the interpreter was killed.
    Timeout(String),
    /// The interpreter could not be started or exited abnormally without
    /// writing any diagnostics.
    Runner(String),
    /// HTTP transport bind or serve failure.
    Http(String),
}

impl AppError {
    /// Whether this error reports an elapsed execution deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::SessionInit(msg) => write!(f, "session init: {msg}"),
            Self::SessionGone(msg) => write!(f, "session gone: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Runner(msg) => write!(f, "runner: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
