//! Error types for the pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that abort a run.
///
/// Deliberately narrow: per-stage collaborator failures are absorbed inside
/// the per-target loop and never surface here.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("could not list change requests: {0}")]
    Listing(#[from] warden_host::HostError),
}
