//! Pipeline run configuration.

use std::path::PathBuf;

use warden_host::RepoId;

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Repository to scan.
    pub repo: RepoId,
    /// Scan a single change request instead of every open one.
    pub pr_number: Option<u64>,
    /// Only files with this extension are scanned.
    pub file_extension: String,
    /// Base branch fix branches are cut from and fix PRs target.
    pub base_branch: String,
    /// Local file to scan when the host cannot serve the file content.
    pub local_fallback: Option<PathBuf>,
    /// Directory to save a copy of each published report into.
    pub report_dir: Option<PathBuf>,
}

impl ScanConfig {
    pub fn new(repo: RepoId) -> Self {
        Self {
            repo,
            pr_number: None,
            file_extension: ".py".to_string(),
            base_branch: "main".to_string(),
            local_fallback: None,
            report_dir: None,
        }
    }

    pub fn single_target(mut self, number: u64) -> Self {
        self.pr_number = Some(number);
        self
    }

    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = branch.into();
        self
    }

    pub fn with_local_fallback(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_fallback = Some(path.into());
        self
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::new(RepoId::new("octo", "demo"));
        assert_eq!(config.file_extension, ".py");
        assert_eq!(config.base_branch, "main");
        assert!(config.pr_number.is_none());
    }

    #[test]
    fn test_single_target() {
        let config = ScanConfig::new(RepoId::new("octo", "demo")).single_target(7);
        assert_eq!(config.pr_number, Some(7));
    }
}
