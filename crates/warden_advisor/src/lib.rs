//! # warden_advisor
//!
//! Language-model advisory client for Codewarden.
//!
//! Two operations are exposed behind the [`Advisor`] trait: a severity
//! assessment for a set of findings, and generation of a candidate
//! replacement source. Calls are single-shot with a per-request timeout;
//! a failed call surfaces as [`AdvisorError`] and the pipeline decides how
//! to degrade.

pub mod client;
pub mod error;
pub mod fence;

pub use client::{Advisor, AdvisorClient, SamplingParams};
pub use error::{AdvisorError, AdvisorResult};
pub use fence::extract_code_block;
