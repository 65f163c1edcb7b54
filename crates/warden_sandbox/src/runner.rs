//! Sandbox trait and execution result types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SandboxResult;

/// Result of one sandboxed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code of the sandboxed process
    pub exit_code: i64,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Isolated code-execution capability.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Check whether the sandbox backend is reachable.
    async fn is_available(&self) -> bool;

    /// Run a code snippet and capture its output.
    async fn run(&self, code: &str) -> SandboxResult<ExecutionResult>;
}
