//! Error types for kvconsole

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Lifecycle Errors ===
    #[error("Port {0} is already registered")]
    DuplicatePort(u16),

    #[error("Port {port} outside allowed range [{min}, {max}]")]
    PortOutOfRange { port: u16, min: u16, max: u16 },

    #[error("Control plane unavailable: {0}")]
    LifecycleUnavailable(String),

    // === Node Errors ===
    #[error("Node {port} unreachable: {reason}")]
    NodeUnreachable { port: u16, reason: String },

    #[error("Key not found: {0}")]
    ReadNotFound(String),

    #[error("No node answered read for key: {0}")]
    ReadExhausted(String),

    #[error("Log stream for node {0} closed")]
    StreamClosed(u16),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LifecycleUnavailable(_)
                | Error::NodeUnreachable { .. }
                | Error::ReadExhausted(_)
                | Error::StreamClosed(_)
                | Error::Http(_)
        )
    }

    /// Errors caused by operator input rather than by the cluster
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::DuplicatePort(_) | Error::PortOutOfRange { .. } | Error::InvalidConfig(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::Other("registry lock poisoned".into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
