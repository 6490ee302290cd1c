//! Error types for the Ringway gateway

use thiserror::Error;

/// Result type alias for Ringway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Ringway gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Telephony provider error
    #[error("provider error: {0}")]
    Provider(String),

    /// Call state error (unknown call, invalid operation)
    #[error("call error: {0}")]
    Call(String),

    /// The call ended before the requested operation completed
    #[error("call ended: {0}")]
    CallEnded(String),

    /// A wait was abandoned after its deadline passed
    #[error("timeout: {0}")]
    Timeout(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
