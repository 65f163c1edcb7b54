//! # warden_host
//!
//! Code host connector and publisher for Codewarden.
//!
//! The [`CodeHost`] trait exposes exactly the operations the pipeline
//! consumes; [`GithubHost`] is the production implementation over the
//! GitHub REST v3 API and [`RecordingHost`] is the test double. The
//! [`Publisher`] layers the domain logic on top: idempotency marker checks,
//! self-generated change-request classification, report composition and fix
//! branch/PR creation.

pub mod error;
pub mod github;
pub mod host;
pub mod mock;
pub mod publisher;
pub mod types;

pub use error::{HostError, HostResult};
pub use github::GithubHost;
pub use host::CodeHost;
pub use mock::RecordingHost;
pub use publisher::{Publisher, FIX_BRANCH_PREFIX, FIX_TITLE_PREFIX, MARKER};
pub use types::{ChangedFile, Comment, FixReference, PullRequest, RepoId};
