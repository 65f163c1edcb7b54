//! Code host trait.

use async_trait::async_trait;

use crate::error::HostResult;
use crate::types::{ChangedFile, Comment, FixReference, PullRequest, RepoId};

/// Operations the pipeline consumes from the code host.
///
/// One concrete implementation exists today ([`crate::GithubHost`]); the
/// boundary exists so tests can substitute [`crate::RecordingHost`] and so
/// another host could slot in without touching the pipeline.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// List open change requests for a repository.
    async fn list_open_pull_requests(&self, repo: &RepoId) -> HostResult<Vec<PullRequest>>;

    /// Fetch a single change request.
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> HostResult<PullRequest>;

    /// List the files changed by a change request.
    async fn get_changed_files(&self, repo: &RepoId, number: u64) -> HostResult<Vec<ChangedFile>>;

    /// Fetch raw file content, optionally at a ref.
    async fn get_file_content(
        &self,
        repo: &RepoId,
        path: &str,
        reference: Option<&str>,
    ) -> HostResult<String>;

    /// List comments on an issue or change request.
    async fn list_comments(&self, repo: &RepoId, issue: u64) -> HostResult<Vec<Comment>>;

    /// Post a comment on an issue or change request.
    async fn post_comment(&self, repo: &RepoId, issue: u64, body: &str) -> HostResult<()>;

    /// Create a branch from an existing ref.
    async fn create_branch(&self, repo: &RepoId, name: &str, from_ref: &str) -> HostResult<()>;

    /// Create or update a file on a branch.
    async fn create_or_update_file(
        &self,
        repo: &RepoId,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> HostResult<()>;

    /// Open a new change request.
    async fn create_pull_request(
        &self,
        repo: &RepoId,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> HostResult<FixReference>;
}
