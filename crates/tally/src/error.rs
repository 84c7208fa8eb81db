//! Tally error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, TallyError>;

/// Errors that can occur while sampling a stream.
///
/// Table and report operations never fail; every variant here originates at
/// the stream source boundary.
#[derive(Error, Debug)]
pub enum TallyError {
    /// The stream source failed to subscribe, deliver or stop.
    #[error("Source error: {0}")]
    Source(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Event (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl TallyError {
    /// Create a source error.
    pub fn source_error(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
