//! Errors surfaced by backend operations.

use thiserror::Error;

use store::{ReplaceError, StoreError};

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is unusable; the message is safe to show the caller.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Replace(#[from] ReplaceError),
    #[error("tables not saved: {}", failed.join(", "))]
    PartialFailure { failed: Vec<String> },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether the caller, not the backend, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}
