//! Mock sandbox for testing.
//!
//! Captures submitted code and replays predefined responses so tests can
//! verify probe behavior without Docker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{SandboxError, SandboxResult};
use crate::runner::{ExecutionResult, Sandbox};

/// Predefined response for one sandbox run.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Recording mock sandbox.
#[derive(Clone, Default)]
pub struct MockSandbox {
    unavailable: Arc<RwLock<bool>>,
    responses: Arc<RwLock<Vec<MockResponse>>>,
    response_index: Arc<AtomicUsize>,
    submitted: Arc<RwLock<Vec<String>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `is_available` report false.
    pub fn unavailable(self) -> Self {
        *self.unavailable.write() = true;
        self
    }

    /// Queue a response for the next `run` call.
    pub fn add_response(self, response: MockResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Make every `run` call fail with the given message.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Code snippets submitted so far.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.read().clone()
    }

    pub fn run_count(&self) -> usize {
        self.submitted.read().len()
    }

    fn next_response(&self) -> MockResponse {
        let responses = self.responses.read();
        if responses.is_empty() {
            return MockResponse::success("");
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index % responses.len())
            .cloned()
            .unwrap_or_else(|| MockResponse::success(""))
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn is_available(&self) -> bool {
        !*self.unavailable.read()
    }

    async fn run(&self, code: &str) -> SandboxResult<ExecutionResult> {
        self.submitted.write().push(code.to_string());

        if let Some(message) = self.simulate_failure.read().clone() {
            return Err(SandboxError::ExecutionFailed(message));
        }

        let response = self.next_response();
        let started_at = Utc::now();

        Ok(ExecutionResult {
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at: started_at,
            duration_ms: 5,
        })
    }
}
