//! Error types for the synchronization engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while talking to the evaluation service.
///
/// None of these are fatal to the engine: connection-level faults
/// degrade the session to a disconnected status and the manager
/// retries on its own.
#[derive(Error, Debug)]
pub enum SyncError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Failed to parse a payload
    #[error("Failed to parse payload: {0}")]
    Parse(String),
}

impl SyncError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }
}
