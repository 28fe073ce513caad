use thiserror::Error;

/// Fatal errors that end a transcoding stream.
///
/// Per-line problems (malformed JSON, missing content) never surface here;
/// they are absorbed by the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    /// The upstream body failed mid-stream
    #[error("Upstream stream failed: {0}")]
    Upstream(String),

    /// The downstream sink rejected a write or failed to close
    #[error("Downstream sink failed: {0}")]
    Sink(String),

    /// An emitted frame did not decode back to its text
    #[error("Frame verification failed: {0}")]
    Verify(String),
}

impl TranscodeError {
    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TranscodeError::Upstream(_) => "upstream",
            TranscodeError::Sink(_) => "sink",
            TranscodeError::Verify(_) => "verify",
        }
    }
}
