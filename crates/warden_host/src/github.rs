//! GitHub REST v3 implementation of the code host.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{HostError, HostResult};
use crate::host::CodeHost;
use crate::types::{ChangedFile, Comment, FixReference, PullRequest, RepoId};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "codewarden";

/// Per-request ceiling; there is no retry logic, so a stalled request must
/// not stall the run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub-backed code host.
pub struct GithubHost {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl GithubHost {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Build a host from `GITHUB_TOKEN`.
    pub fn from_env() -> HostResult<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or(HostError::NotConfigured)?;
        Ok(Self::new(token))
    }

    /// Point at a different API base (GitHub Enterprise, test server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn check(response: reqwest::Response) -> HostResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Resolve the commit sha a branch currently points at.
    async fn ref_sha(&self, repo: &RepoId, branch: &str) -> HostResult<String> {
        let path = format!("/repos/{}/git/ref/heads/{}", repo.slug(), branch);
        let response = Self::check(self.request(reqwest::Method::GET, &path).send().await?).await?;
        let reference: ApiGitRef = response.json().await?;
        Ok(reference.object.sha)
    }

    /// Blob sha of a file on a branch, if it already exists there.
    async fn existing_file_sha(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
    ) -> Option<String> {
        let api_path = format!("/repos/{}/contents/{}?ref={}", repo.slug(), path, branch);
        let response = self
            .request(reqwest::Method::GET, &api_path)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let value: serde_json::Value = response.json().await.ok()?;
        value.get("sha").and_then(|s| s.as_str()).map(String::from)
    }
}

#[async_trait]
impl CodeHost for GithubHost {
    async fn list_open_pull_requests(&self, repo: &RepoId) -> HostResult<Vec<PullRequest>> {
        debug!("listing open pull requests for {}", repo.slug());
        let path = format!("/repos/{}/pulls?state=open", repo.slug());
        let response = Self::check(self.request(reqwest::Method::GET, &path).send().await?).await?;
        let prs: Vec<ApiPullRequest> = response.json().await?;
        Ok(prs.into_iter().map(Into::into).collect())
    }

    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> HostResult<PullRequest> {
        let path = format!("/repos/{}/pulls/{}", repo.slug(), number);
        let response = Self::check(self.request(reqwest::Method::GET, &path).send().await?).await?;
        let pr: ApiPullRequest = response.json().await?;
        Ok(pr.into())
    }

    async fn get_changed_files(&self, repo: &RepoId, number: u64) -> HostResult<Vec<ChangedFile>> {
        let path = format!("/repos/{}/pulls/{}/files", repo.slug(), number);
        let response = Self::check(self.request(reqwest::Method::GET, &path).send().await?).await?;
        let files: Vec<ChangedFile> = response.json().await?;
        Ok(files)
    }

    async fn get_file_content(
        &self,
        repo: &RepoId,
        path: &str,
        reference: Option<&str>,
    ) -> HostResult<String> {
        let mut api_path = format!("/repos/{}/contents/{}", repo.slug(), path);
        if let Some(reference) = reference {
            api_path.push_str(&format!("?ref={}", reference));
        }

        // The raw media type skips the base64 round-trip.
        let response = Self::check(
            self.request(reqwest::Method::GET, &api_path)
                .header("Accept", "application/vnd.github.v3.raw")
                .send()
                .await?,
        )
        .await?;

        Ok(response.text().await?)
    }

    async fn list_comments(&self, repo: &RepoId, issue: u64) -> HostResult<Vec<Comment>> {
        let path = format!("/repos/{}/issues/{}/comments", repo.slug(), issue);
        let response = Self::check(self.request(reqwest::Method::GET, &path).send().await?).await?;
        let comments: Vec<ApiComment> = response.json().await?;
        Ok(comments.into_iter().map(Into::into).collect())
    }

    async fn post_comment(&self, repo: &RepoId, issue: u64, body: &str) -> HostResult<()> {
        let path = format!("/repos/{}/issues/{}/comments", repo.slug(), issue);
        Self::check(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "body": body }))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn create_branch(&self, repo: &RepoId, name: &str, from_ref: &str) -> HostResult<()> {
        let sha = self.ref_sha(repo, from_ref).await?;
        let path = format!("/repos/{}/git/refs", repo.slug());
        Self::check(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({
                    "ref": format!("refs/heads/{}", name),
                    "sha": sha,
                }))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn create_or_update_file(
        &self,
        repo: &RepoId,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> HostResult<()> {
        let api_path = format!("/repos/{}/contents/{}", repo.slug(), path);

        let mut payload = json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": branch,
        });
        if let Some(sha) = self.existing_file_sha(repo, path, branch).await {
            payload["sha"] = json!(sha);
        }

        Self::check(
            self.request(reqwest::Method::PUT, &api_path)
                .json(&payload)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repo: &RepoId,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> HostResult<FixReference> {
        let path = format!("/repos/{}/pulls", repo.slug());
        let response = Self::check(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({
                    "title": title,
                    "body": body,
                    "head": head,
                    "base": base,
                }))
                .send()
                .await?,
        )
        .await?;

        let created: ApiCreatedPullRequest = response.json().await?;
        Ok(FixReference {
            number: created.number,
        })
    }
}

// GitHub wire types, narrowed to the fields the pipeline uses.
#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    user: ApiUser,
    head: ApiRef,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    body: String,
    user: ApiUser,
}

#[derive(Debug, Deserialize)]
struct ApiGitRef {
    object: ApiGitObject,
}

#[derive(Debug, Deserialize)]
struct ApiGitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiCreatedPullRequest {
    number: u64,
}

impl From<ApiPullRequest> for PullRequest {
    fn from(pr: ApiPullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title,
            author: pr.user.login,
            head_ref: pr.head.name,
        }
    }
}

impl From<ApiComment> for Comment {
    fn from(comment: ApiComment) -> Self {
        Self {
            body: comment.body,
            author: comment.user.login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_pull_request_mapping() {
        let raw = r#"{
            "number": 12,
            "title": "Add user lookup",
            "user": {"login": "alice"},
            "head": {"ref": "feature/lookup"}
        }"#;
        let api: ApiPullRequest = serde_json::from_str(raw).unwrap();
        let pr: PullRequest = api.into();

        assert_eq!(pr.number, 12);
        assert_eq!(pr.author, "alice");
        assert_eq!(pr.head_ref, "feature/lookup");
    }

    #[test]
    fn test_changed_file_mapping() {
        let raw = r#"[{"filename": "app.py", "additions": 10, "deletions": 2}]"#;
        let files: Vec<ChangedFile> = serde_json::from_str(raw).unwrap();
        assert_eq!(files[0].filename, "app.py");
        assert_eq!(files[0].additions, 10);
    }
}
