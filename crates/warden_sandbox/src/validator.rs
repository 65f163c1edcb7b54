//! Exploit-probe validation.
//!
//! The probe is a fixed, pre-authored snippet: it is deliberately generic
//! rather than derived from any particular finding, so the advisory model
//! never influences what the sandbox executes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::runner::{ExecutionResult, Sandbox};

/// Outcome of one validation probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    /// The exploit payload returned no more rows than a legitimate lookup.
    Blocked,
    /// The payload returned extra rows; injection still succeeds.
    NotBlocked,
    /// The probe ran but produced no classifiable output.
    Indeterminate,
    /// No sandbox available; the probe was not attempted.
    Skipped,
}

impl Validation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::NotBlocked => "not blocked",
            Self::Indeterminate => "indeterminate",
            Self::Skipped => "skipped",
        }
    }
}

/// Exploit probe: an in-memory store seeded with two rows, queried with the
/// classic tautology payload bound through a parameter placeholder. A safe
/// driver either returns no matching row or raises on the malformed value.
/// The probe prints `rows=<n>` so the outcome can be classified from stdout.
const EXPLOIT_PROBE: &str = r#"
import sqlite3
conn = sqlite3.connect(':memory:')
c = conn.cursor()
c.execute('CREATE TABLE users (id INT, name TEXT)')
c.execute("INSERT INTO users VALUES (1, 'alice')")
c.execute("INSERT INTO users VALUES (2, 'bob')")
conn.commit()
try:
    c.execute("SELECT * FROM users WHERE id = ?", ("1 OR 1=1",))
    print("rows=%d" % len(c.fetchall()))
except Exception as exc:
    print("error=%s" % exc)
conn.close()
"#;

/// A legitimate lookup matches at most this many rows; anything beyond it
/// means the tautology leaked through.
const EXPECTED_ROWS: u64 = 1;

/// Validator over an optional sandbox collaborator.
pub struct Validator {
    sandbox: Option<Arc<dyn Sandbox>>,
}

impl Validator {
    pub fn new(sandbox: Option<Arc<dyn Sandbox>>) -> Self {
        Self { sandbox }
    }

    /// Validator with no sandbox; every probe reports [`Validation::Skipped`].
    pub fn disabled() -> Self {
        Self { sandbox: None }
    }

    /// Run the exploit probe and classify the outcome.
    ///
    /// Sandbox absence or failure yields `Skipped`, never `Blocked`: the
    /// absence of a sandbox must not read as validation success.
    pub async fn probe(&self) -> Validation {
        let Some(sandbox) = &self.sandbox else {
            debug!("no sandbox collaborator, skipping validation");
            return Validation::Skipped;
        };

        if !sandbox.is_available().await {
            warn!("sandbox unreachable, skipping validation");
            return Validation::Skipped;
        }

        match sandbox.run(EXPLOIT_PROBE).await {
            Ok(result) => classify(&result),
            Err(e) => {
                warn!("sandbox probe failed: {}", e);
                Validation::Skipped
            }
        }
    }
}

/// Classify a probe execution.
fn classify(result: &ExecutionResult) -> Validation {
    if let Some(rows) = parse_row_count(&result.stdout) {
        return if rows <= EXPECTED_ROWS {
            Validation::Blocked
        } else {
            Validation::NotBlocked
        };
    }

    // The driver raising on the malformed payload also counts as blocked.
    if result.stdout.contains("error=") || result.exit_code != 0 || !result.stderr.is_empty() {
        return Validation::Blocked;
    }

    Validation::Indeterminate
}

fn parse_row_count(stdout: &str) -> Option<u64> {
    for line in stdout.lines() {
        if let Some(value) = line.trim().strip_prefix("rows=") {
            return value.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockResponse, MockSandbox};

    #[tokio::test]
    async fn test_probe_with_bound_payload_is_blocked() {
        // Parameter binding makes the payload match nothing: zero rows.
        let sandbox = MockSandbox::new().add_response(MockResponse::success("rows=0\n"));
        let validator = Validator::new(Some(Arc::new(sandbox)));

        assert_eq!(validator.probe().await, Validation::Blocked);
    }

    #[tokio::test]
    async fn test_extra_rows_mean_not_blocked() {
        let sandbox = MockSandbox::new().add_response(MockResponse::success("rows=2\n"));
        let validator = Validator::new(Some(Arc::new(sandbox)));

        assert_eq!(validator.probe().await, Validation::NotBlocked);
    }

    #[tokio::test]
    async fn test_driver_raising_counts_as_blocked() {
        let sandbox = MockSandbox::new()
            .add_response(MockResponse::success("error=invalid literal for int\n"));
        let validator = Validator::new(Some(Arc::new(sandbox)));

        assert_eq!(validator.probe().await, Validation::Blocked);
    }

    #[tokio::test]
    async fn test_nonzero_exit_counts_as_blocked() {
        let sandbox =
            MockSandbox::new().add_response(MockResponse::failure(1, "Traceback (most recent)"));
        let validator = Validator::new(Some(Arc::new(sandbox)));

        assert_eq!(validator.probe().await, Validation::Blocked);
    }

    #[tokio::test]
    async fn test_unclassifiable_output_is_indeterminate() {
        let sandbox = MockSandbox::new().add_response(MockResponse::success("hello world\n"));
        let validator = Validator::new(Some(Arc::new(sandbox)));

        assert_eq!(validator.probe().await, Validation::Indeterminate);
    }

    #[tokio::test]
    async fn test_missing_sandbox_is_skipped() {
        assert_eq!(Validator::disabled().probe().await, Validation::Skipped);
    }

    #[tokio::test]
    async fn test_unavailable_sandbox_is_skipped_without_running() {
        let sandbox = MockSandbox::new().unavailable();
        let handle = Arc::new(sandbox.clone());
        let validator = Validator::new(Some(handle));

        assert_eq!(validator.probe().await, Validation::Skipped);
        assert_eq!(sandbox.run_count(), 0);
    }

    #[tokio::test]
    async fn test_run_failure_is_skipped_not_blocked() {
        let sandbox = MockSandbox::new().simulate_failure("daemon gone");
        let validator = Validator::new(Some(Arc::new(sandbox)));

        assert_eq!(validator.probe().await, Validation::Skipped);
    }

    #[tokio::test]
    async fn test_probe_submits_the_fixed_snippet() {
        let sandbox = MockSandbox::new().add_response(MockResponse::success("rows=0\n"));
        let handle = Arc::new(sandbox.clone());
        let validator = Validator::new(Some(handle));

        let _ = validator.probe().await;

        let submitted = sandbox.submitted();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].contains("1 OR 1=1"));
        assert!(submitted[0].contains("WHERE id = ?"));
    }
}
