//! Error types for the advisory client.

use thiserror::Error;

/// Result type alias for advisory operations.
pub type AdvisorResult<T> = Result<T, AdvisorError>;

/// Errors that can occur calling the advisory model.
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("advisory model not configured. Set LLM_API_KEY or NVIDIA_API_KEY")]
    NotConfigured,

    #[error("advisory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("advisory API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("advisory model returned no completion")]
    EmptyCompletion,
}
