//! Research client with a strict wall-clock budget.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_MODEL: &str = "sonar";

/// Wall-clock budget for one lookup.
const DEFAULT_BUDGET: Duration = Duration::from_secs(15);

/// CVE background replies are clipped to this many characters.
const CVE_EXCERPT_CHARS: usize = 300;
/// Fix-example replies are clipped to this many characters.
const EXAMPLE_EXCERPT_CHARS: usize = 500;

/// Internal lookup errors. These never leave the crate as errors; they are
/// rendered into sentinel strings.
#[derive(Error, Debug)]
enum ResearchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no content in reply")]
    EmptyReply,
}

/// Research capability consumed by the pipeline.
#[async_trait]
pub trait Research: Send + Sync {
    /// Free-form lookup. Returns plain text, a sentinel describing a
    /// timeout or error, or an empty string when no provider is configured.
    async fn research(&self, query: &str) -> String;

    /// CVE background for a vulnerability category.
    async fn cve_background(&self, kind: &str) -> String {
        let reply = self.research(&format!("{} CVSS score 2024", kind)).await;
        truncate_chars(&reply, CVE_EXCERPT_CHARS).to_string()
    }

    /// Real-world remediation examples for a vulnerability category.
    async fn fix_examples(&self, kind: &str) -> String {
        let reply = self
            .research(&format!("{} parameterized queries fix Python", kind))
            .await;
        truncate_chars(&reply, EXAMPLE_EXCERPT_CHARS).to_string()
    }
}

/// Concrete research client over an OpenAI-compatible search endpoint.
pub struct ResearchClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    budget: Duration,
}

impl ResearchClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            budget: DEFAULT_BUDGET,
        }
    }

    /// Build a client from `RESEARCH_API_KEY` (or `PERPLEXITY_API_KEY`).
    /// A missing key is not an error: the client stays unconfigured and
    /// every lookup returns an empty string.
    pub fn from_env() -> Self {
        let api_key = std::env::var("RESEARCH_API_KEY")
            .or_else(|_| std::env::var("PERPLEXITY_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());

        let base_url =
            std::env::var("RESEARCH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("RESEARCH_MODEL").ok();

        Self::new(base_url, api_key, model)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    async fn search(&self, api_key: &str, query: &str) -> Result<String, ResearchError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request = SearchRequest {
            model: self.model.clone(),
            messages: vec![SearchMessage {
                role: "user".to_string(),
                content: query.to_string(),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: SearchResponse = response.json().await?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ResearchError::EmptyReply)
    }
}

#[async_trait]
impl Research for ResearchClient {
    async fn research(&self, query: &str) -> String {
        let Some(api_key) = self.api_key.clone() else {
            debug!("research collaborator not configured, skipping lookup");
            return String::new();
        };

        bounded(self.budget, self.search(&api_key, query)).await
    }
}

/// Run a lookup under a budget, converting every failure mode into data.
async fn bounded<F>(budget: Duration, search: F) -> String
where
    F: Future<Output = Result<String, ResearchError>>,
{
    match tokio::time::timeout(budget, search).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("research lookup failed: {}", e);
            format!("research error: {}", truncate_chars(&e.to_string(), 100))
        }
        Err(_) => {
            warn!("research lookup exceeded {}s budget", budget.as_secs());
            format!("research timed out ({}s limit)", budget.as_secs())
        }
    }
}

fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

// Wire types for the search endpoint.
#[derive(Debug, Serialize)]
struct SearchRequest {
    model: String,
    messages: Vec<SearchMessage>,
}

#[derive(Debug, Serialize)]
struct SearchMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    choices: Vec<SearchChoice>,
}

#[derive(Debug, Deserialize)]
struct SearchChoice {
    message: SearchResponseMessage,
}

#[derive(Debug, Deserialize)]
struct SearchResponseMessage {
    content: String,
}
