//! Advisory model client over an OpenAI-compatible completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_detect::Finding;

use crate::error::{AdvisorError, AdvisorResult};
use crate::fence::extract_code_block;

const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
const DEFAULT_MODEL: &str = "nvidia/nvidia-nemotron-nano-9b-v2";

/// Character budget for the vulnerable source embedded in the remediation
/// prompt, so large files cannot blow the model's context window.
const SOURCE_CHAR_BUDGET: usize = 1000;

/// Per-request wall-clock ceiling. There is no retry logic, so a hung
/// collaborator must not hang the whole run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl SamplingParams {
    /// Judgment task: lower randomness favors consistency.
    pub fn assessment() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 400,
        }
    }

    /// Code generation: lower still, and a larger ceiling since code runs
    /// longer than prose.
    pub fn remediation() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2500,
        }
    }
}

/// Advisory capability consumed by the pipeline.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Narrative severity judgment for a set of findings.
    async fn assess(
        &self,
        pr_number: u64,
        title: &str,
        author: &str,
        findings: &[Finding],
        research: &str,
    ) -> AdvisorResult<String>;

    /// Candidate replacement source for the vulnerable file.
    async fn remediate(
        &self,
        source: &str,
        findings: &[Finding],
        examples: &str,
    ) -> AdvisorResult<String>;
}

/// Concrete advisory client.
pub struct AdvisorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AdvisorClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// Build a client from `LLM_API_KEY` (or `NVIDIA_API_KEY`), with
    /// `LLM_BASE_URL` and `LLM_MODEL` overrides.
    pub fn from_env() -> AdvisorResult<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("NVIDIA_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(AdvisorError::NotConfigured)?;

        let base_url =
            std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("LLM_MODEL").ok();

        Ok(Self::new(base_url, api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One single-shot completion call. Failures are not retried.
    pub async fn complete(&self, prompt: &str, params: SamplingParams) -> AdvisorResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let result: ChatResponse = response.json().await?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AdvisorError::EmptyCompletion)
    }
}

#[async_trait]
impl Advisor for AdvisorClient {
    async fn assess(
        &self,
        pr_number: u64,
        title: &str,
        author: &str,
        findings: &[Finding],
        research: &str,
    ) -> AdvisorResult<String> {
        let prompt = build_assessment_prompt(pr_number, title, author, findings, research);
        debug!(pr_number, "requesting severity assessment");
        self.complete(&prompt, SamplingParams::assessment()).await
    }

    async fn remediate(
        &self,
        source: &str,
        findings: &[Finding],
        examples: &str,
    ) -> AdvisorResult<String> {
        let prompt = build_remediation_prompt(source, findings, examples);
        debug!("requesting remediation");
        let raw = self.complete(&prompt, SamplingParams::remediation()).await?;

        // Best effort: when the model skips the fence, pass the raw
        // completion through verbatim.
        Ok(extract_code_block(&raw).unwrap_or(raw))
    }
}

fn itemize(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| format!("- Line {}: {}", f.line, f.rationale))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate at a character boundary without panicking on multi-byte input.
fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn build_assessment_prompt(
    pr_number: u64,
    title: &str,
    author: &str,
    findings: &[Finding],
    research: &str,
) -> String {
    let research_context = if research.is_empty() {
        String::new()
    } else {
        format!("\nRecent CVE research:\n{}\n", research)
    };

    format!(
        "Security assessment for Pull Request #{}:\n\n\
         Title: {}\n\
         Author: {}\n\n\
         Vulnerabilities found:\n{}\n{}\n\
         Provide quick assessment:\n\
         RISK: CRITICAL/HIGH/MEDIUM/LOW\n\
         ACTION: Brief recommendation (50 words)",
        pr_number,
        title,
        author,
        itemize(findings),
        research_context,
    )
}

fn build_remediation_prompt(source: &str, findings: &[Finding], examples: &str) -> String {
    let examples_context = if examples.is_empty() {
        String::new()
    } else {
        format!(
            "\nReal-world fix examples:\n{}\n\nUse these patterns as reference for the fix.\n",
            examples
        )
    };

    format!(
        "Fix these security vulnerabilities:\n\n{}\n\n\
         Code:\n```python\n{}\n```\n{}\n\
         Generate COMPLETE fixed code using parameterized queries. Code only.",
        itemize(findings),
        truncate_chars(source, SOURCE_CHAR_BUDGET),
        examples_context,
    )
}

// OpenAI-compatible API types.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}
