use thiserror::Error;

/// Errors that can occur while browsing or transferring from a remote drive
#[derive(Error, Debug)]
pub enum DriveError {
    /// The credential was rejected; the caller should re-authorize rather than retry
    #[error("Authentication failed: {message}. Please refresh or re-authorize the connection")]
    Auth { message: String },

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("File size ({size} bytes) exceeds transfer limit of {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("Failed to transfer chunk {sequence} after {attempts} attempts: {message}")]
    ChunkTransferFailed {
        sequence: u64,
        attempts: u32,
        message: String,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid cursor: {message}")]
    InvalidCursor { message: String },
}

impl DriveError {
    /// True when the caller should prompt for new credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, DriveError::Auth { .. })
    }

    /// True for failures a caller-side retry might clear
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriveError::Transport { .. } | DriveError::ChunkTransferFailed { .. }
        )
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        DriveError::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DriveError {
    fn from(err: serde_json::Error) -> Self {
        DriveError::Transport {
            message: format!("malformed response: {}", err),
        }
    }
}

/// Failure reported by a [`ChunkSink`](crate::streamer::ChunkSink) for a single send attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SendError {
    pub message: String,
}

impl SendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type alias for drive operations
pub type Result<T> = std::result::Result<T, DriveError>;
