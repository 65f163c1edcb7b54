//! # warden_detect
//!
//! Line-oriented vulnerability detection for Codewarden.
//!
//! The detector is a fast textual pre-filter, not a parser: it scans source
//! text line by line against a fixed, ordered rule table and reports at most
//! one finding per line. It performs no I/O and never fails; an empty result
//! is the normal outcome for clean input.

pub mod finding;
pub mod rules;

pub use finding::{Finding, FindingKind, Severity};
pub use rules::detect;
