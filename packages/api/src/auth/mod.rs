//! Service-account authentication against the spreadsheet store.

mod config;
mod google;

pub use config::{ServiceAccountConfig, ServiceAccountKey, GOOGLE_TOKEN_URL, SPREADSHEETS_SCOPE};
pub use google::{Credential, ServiceAccountAuth, ASSERTION_LIFETIME_SECS};

use thiserror::Error;

/// Failure to obtain a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid service account key: {0}")]
    InvalidKey(String),
    #[error("failed to sign assertion: {0}")]
    Signing(String),
    #[error("token request failed: {0}")]
    Transport(String),
    #[error("token endpoint rejected the assertion ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("token response has no usable access token: {0}")]
    MissingToken(String),
}
