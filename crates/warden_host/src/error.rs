//! Error types for the code host connector.

use thiserror::Error;

/// Result type alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors that can occur talking to the code host.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("code host not configured. Set GITHUB_TOKEN")]
    NotConfigured,

    #[error("code host request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("code host API error {status}: {body}")]
    Api { status: u16, body: String },
}
