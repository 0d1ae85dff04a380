//! Error types for the hub.

use pubgraph_core::{CoreError, HubError};
use pubgraph_store::StoreError;
use thiserror::Error;

/// Errors that can occur during hub operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation was rejected. Nothing was changed.
    #[error("rejected: {0}")]
    Hub(#[from] HubError),

    /// Storage error. The in-memory state was rolled back.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Encoding error.
    #[error("encoding error: {0}")]
    Core(#[from] CoreError),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// Persisted state does not form a consistent hub.
    #[error("corrupt state: {0}")]
    Corrupt(String),
}

impl Error {
    /// The protocol error, if the operation was rejected by the rules.
    pub fn hub_error(&self) -> Option<&HubError> {
        match self {
            Error::Hub(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, Error>;
