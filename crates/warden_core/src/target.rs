//! Per-target work units.

use warden_sandbox::Validation;

/// One unit of work: a change request plus one of its changed files.
/// Constructed per iteration of the run loop and discarded afterwards.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub pr_number: u64,
    pub filename: String,
    pub source: String,
}

/// Outcome of one candidate fix for a single target.
#[derive(Debug, Clone)]
pub struct RemediationResult {
    /// Candidate replacement source; empty when generation failed.
    pub fixed_text: String,
    pub validation: Validation,
}

impl RemediationResult {
    /// Whether a non-empty candidate came back from the advisory model.
    pub fn generated(&self) -> bool {
        !self.fixed_text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fix_is_not_generated() {
        let result = RemediationResult {
            fixed_text: "  \n".to_string(),
            validation: Validation::Skipped,
        };
        assert!(!result.generated());
    }

    #[test]
    fn test_nonempty_fix_is_generated() {
        let result = RemediationResult {
            fixed_text: "cursor.execute(query, params)".to_string(),
            validation: Validation::Blocked,
        };
        assert!(result.generated());
    }
}
