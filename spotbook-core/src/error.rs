//! Error Types
//!
//! One error enum shared by every layer of the client.

use thiserror::Error;

/// Common result type for client operations
pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Transport-level failure talking to a remote API
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("Places API returned {status}: {message}")]
    Places { status: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DomainError {
    pub(crate) fn remote(status: u16, message: impl Into<String>) -> Self {
        DomainError::Remote {
            status,
            message: message.into(),
        }
    }

    /// True if the failure came from the remote side (network or HTTP status)
    pub fn is_remote(&self) -> bool {
        matches!(self, DomainError::Http(_) | DomainError::Remote { .. })
    }
}
