//! # warden_core
//!
//! The scan-and-remediate pipeline.
//!
//! The [`Pipeline`] owns every collaborator handle for the lifetime of one
//! run and walks each change request through a fixed sequence: skip checks,
//! file fetch, detection, concurrent research and assessment, remediation,
//! validation, publication. Stage failures degrade to empty or sentinel
//! values; only a failure listing the targets aborts the run, because then
//! there is nothing to iterate.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod summary;
pub mod target;

pub use config::ScanConfig;
pub use error::{CoreError, CoreResult};
pub use pipeline::Pipeline;
pub use summary::{RunSummary, TargetRecord, TargetState};
pub use target::{RemediationResult, ScanTarget};
