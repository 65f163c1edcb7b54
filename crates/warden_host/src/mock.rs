//! Recording code host for testing.
//!
//! Captures every call and serves seeded data, so tests can assert which
//! host operations a scenario performed without any network traffic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{HostError, HostResult};
use crate::host::CodeHost;
use crate::types::{ChangedFile, Comment, FixReference, PullRequest, RepoId};

/// Recording test double for [`CodeHost`].
#[derive(Clone)]
pub struct RecordingHost {
    pull_requests: Arc<RwLock<Vec<PullRequest>>>,
    files: Arc<RwLock<HashMap<u64, Vec<ChangedFile>>>>,
    contents: Arc<RwLock<HashMap<String, String>>>,
    comments: Arc<RwLock<HashMap<u64, Vec<Comment>>>>,
    calls: Arc<RwLock<Vec<String>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    next_fix_number: Arc<RwLock<u64>>,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            pull_requests: Arc::new(RwLock::new(Vec::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            contents: Arc::new(RwLock::new(HashMap::new())),
            comments: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashSet::new())),
            next_fix_number: Arc::new(RwLock::new(100)),
        }
    }

    /// Seed an open pull request.
    pub fn with_pull_request(self, pr: PullRequest) -> Self {
        self.pull_requests.write().push(pr);
        self
    }

    /// Seed the changed-file list for a pull request.
    pub fn with_files(self, number: u64, files: Vec<ChangedFile>) -> Self {
        self.files.write().insert(number, files);
        self
    }

    /// Seed raw file content by path.
    pub fn with_content(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.contents.write().insert(path.into(), content.into());
        self
    }

    /// Seed an existing comment on an issue.
    pub fn with_comment(self, issue: u64, body: impl Into<String>, author: impl Into<String>) -> Self {
        self.comments.write().entry(issue).or_default().push(Comment {
            body: body.into(),
            author: author.into(),
        });
        self
    }

    /// Make the named method fail with a simulated server error.
    pub fn fail_on(self, method: &str) -> Self {
        self.failures.write().insert(method.to_string());
        self
    }

    /// All recorded call names, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.calls.read().iter().any(|c| c == method)
    }

    pub fn method_calls(&self, method: &str) -> usize {
        self.calls.read().iter().filter(|c| *c == method).count()
    }

    /// Comments posted to an issue during the test.
    pub fn posted_comments(&self, issue: u64) -> Vec<Comment> {
        self.comments.read().get(&issue).cloned().unwrap_or_default()
    }

    fn record(&self, method: &str) -> HostResult<()> {
        self.calls.write().push(method.to_string());
        if self.failures.read().contains(method) {
            return Err(HostError::Api {
                status: 500,
                body: format!("simulated {} failure", method),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CodeHost for RecordingHost {
    async fn list_open_pull_requests(&self, _repo: &RepoId) -> HostResult<Vec<PullRequest>> {
        self.record("list_open_pull_requests")?;
        Ok(self.pull_requests.read().clone())
    }

    async fn get_pull_request(&self, _repo: &RepoId, number: u64) -> HostResult<PullRequest> {
        self.record("get_pull_request")?;
        self.pull_requests
            .read()
            .iter()
            .find(|pr| pr.number == number)
            .cloned()
            .ok_or(HostError::Api {
                status: 404,
                body: format!("no pull request #{}", number),
            })
    }

    async fn get_changed_files(&self, _repo: &RepoId, number: u64) -> HostResult<Vec<ChangedFile>> {
        self.record("get_changed_files")?;
        Ok(self.files.read().get(&number).cloned().unwrap_or_default())
    }

    async fn get_file_content(
        &self,
        _repo: &RepoId,
        path: &str,
        _reference: Option<&str>,
    ) -> HostResult<String> {
        self.record("get_file_content")?;
        self.contents
            .read()
            .get(path)
            .cloned()
            .ok_or(HostError::Api {
                status: 404,
                body: format!("no content for {}", path),
            })
    }

    async fn list_comments(&self, _repo: &RepoId, issue: u64) -> HostResult<Vec<Comment>> {
        self.record("list_comments")?;
        Ok(self.comments.read().get(&issue).cloned().unwrap_or_default())
    }

    async fn post_comment(&self, _repo: &RepoId, issue: u64, body: &str) -> HostResult<()> {
        self.record("post_comment")?;
        self.comments.write().entry(issue).or_default().push(Comment {
            body: body.to_string(),
            author: "warden".to_string(),
        });
        Ok(())
    }

    async fn create_branch(&self, _repo: &RepoId, _name: &str, _from_ref: &str) -> HostResult<()> {
        self.record("create_branch")?;
        Ok(())
    }

    async fn create_or_update_file(
        &self,
        _repo: &RepoId,
        path: &str,
        content: &str,
        _message: &str,
        _branch: &str,
    ) -> HostResult<()> {
        self.record("create_or_update_file")?;
        self.contents
            .write()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn create_pull_request(
        &self,
        _repo: &RepoId,
        _title: &str,
        _body: &str,
        _head: &str,
        _base: &str,
    ) -> HostResult<FixReference> {
        self.record("create_pull_request")?;
        let mut next = self.next_fix_number.write();
        let number = *next;
        *next += 1;
        Ok(FixReference { number })
    }
}
