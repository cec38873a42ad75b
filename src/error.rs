//! Error types for Retake

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Retake operations
pub type Result<T> = std::result::Result<T, RetakeError>;

/// Errors that can occur in Retake
#[derive(Debug, Error)]
pub enum RetakeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No session is active but one is required
    #[error("mocking is not enabled")]
    NotEnabled,

    /// Fixture file missing on disk during replay load
    #[error("fixture not found: {}", .0.display())]
    FixtureNotFound(PathBuf),

    /// Fixture file exists but cannot be parsed
    #[error("invalid fixture {}: {source}", .path.display())]
    FixtureParse {
        /// Path of the offending fixture file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Fixture serialization failed while persisting a recording
    #[error("failed to serialize fixture for session {session_id}: {source}")]
    FixtureSerialize {
        /// Session being persisted
        session_id: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Request has no registered match rule during replay
    #[error("no recorded response for {method} {origin}{path}")]
    UnmatchedRequest {
        /// Request origin (scheme + host + port)
        origin: String,
        /// HTTP method
        method: String,
        /// Request path
        path: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying transport failure
    #[error("transport error: {0}")]
    Transport(String),
}
