//! Error types for chatrelay

use thiserror::Error;

/// Main error type for chatrelay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration errors (missing file, bad TOML, missing API key)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream provider errors raised outside of a running stream
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Proxy/HTTP server errors
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream transcoding errors
    #[error(transparent)]
    Transcode(#[from] crate::transcode::TranscodeError),
}

/// Result type alias for chatrelay operations
pub type Result<T> = std::result::Result<T, RelayError>;
