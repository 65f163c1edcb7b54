//! Error types for the sandbox module.

use thiserror::Error;

/// Result type alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors that can occur during sandbox operations.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Docker not available: {0}")]
    DockerNotAvailable(String),

    #[error("sandbox execution failed: {0}")]
    ExecutionFailed(String),

    #[error("image pull failed: {0}")]
    ImagePullFailed(String),

    #[error("sandbox timeout after {0} seconds")]
    Timeout(u64),

    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),
}
