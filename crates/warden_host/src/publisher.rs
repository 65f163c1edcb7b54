//! Report and fix publication.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use warden_detect::Finding;
use warden_sandbox::Validation;

use crate::host::CodeHost;
use crate::types::{FixReference, PullRequest, RepoId};

/// Attribution phrase embedded in every published comment. `already_handled`
/// finds prior posts by substring-searching comment bodies for this marker,
/// so changing it invalidates idempotency against history.
pub const MARKER: &str = "Automated review by Codewarden Security Triage Agent";

/// Branch prefix used for fix branches; also how the agent recognizes its
/// own change requests.
pub const FIX_BRANCH_PREFIX: &str = "security-fix-pr-";

/// Title prefix for fix change requests; second self-recognition convention.
pub const FIX_TITLE_PREFIX: &str = "Security fix:";

/// Publishes findings and fixes back to the code host.
pub struct Publisher {
    host: Arc<dyn CodeHost>,
    repo: RepoId,
    base_branch: String,
    report_dir: Option<PathBuf>,
}

impl Publisher {
    pub fn new(host: Arc<dyn CodeHost>, repo: RepoId) -> Self {
        Self {
            host,
            repo,
            base_branch: "main".to_string(),
            report_dir: None,
        }
    }

    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = branch.into();
        self
    }

    /// Also write each composed report to `<dir>/PR_<n>_security_review.md`.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Whether a prior run already reviewed this change request.
    ///
    /// A failure listing comments degrades to "not handled": a duplicate
    /// comment is cheaper than a silently skipped review.
    pub async fn already_handled(&self, number: u64) -> bool {
        match self.host.list_comments(&self.repo, number).await {
            Ok(comments) => comments.iter().any(|c| c.body.contains(MARKER)),
            Err(e) => {
                warn!("could not list comments on #{}: {}", number, e);
                false
            }
        }
    }

    /// Whether a change request was created by this agent. Re-scanning our
    /// own fix PRs would loop forever.
    pub fn is_self_generated(&self, pr: &PullRequest) -> bool {
        pr.head_ref.starts_with(FIX_BRANCH_PREFIX) || pr.title.starts_with(FIX_TITLE_PREFIX)
    }

    /// Compose and post the security review comment. Returns whether the
    /// post succeeded; posting failure is non-fatal to the run.
    pub async fn publish_report(
        &self,
        pr: &PullRequest,
        findings: &[Finding],
        assessment: &str,
        research: &str,
        validation: Validation,
        fix: Option<&FixReference>,
    ) -> bool {
        let body = compose_report(pr, findings, assessment, research, validation, fix);

        if let Some(dir) = &self.report_dir {
            let path = dir.join(format!("PR_{}_security_review.md", pr.number));
            if let Err(e) = std::fs::write(&path, &body) {
                warn!("could not save report copy to {}: {}", path.display(), e);
            }
        }

        match self.host.post_comment(&self.repo, pr.number, &body).await {
            Ok(()) => {
                info!("review posted on #{}", pr.number);
                true
            }
            Err(e) => {
                warn!("could not post review on #{}: {}", pr.number, e);
                false
            }
        }
    }

    /// Create a fix branch, commit the remediated file, and open a fix
    /// change request referencing the original.
    ///
    /// Returns `None` on failure at any step: a branch without a change
    /// request is useless, and referencing a half-created fix downstream
    /// would be worse.
    pub async fn publish_fix(
        &self,
        original: &PullRequest,
        filename: &str,
        fixed_text: &str,
        findings: &[Finding],
    ) -> Option<FixReference> {
        let branch = format!("{}{}", FIX_BRANCH_PREFIX, original.number);

        if let Err(e) = self
            .host
            .create_branch(&self.repo, &branch, &self.base_branch)
            .await
        {
            warn!("could not create fix branch {}: {}", branch, e);
            return None;
        }

        let message = format!("Security fix for PR #{}", original.number);
        if let Err(e) = self
            .host
            .create_or_update_file(&self.repo, filename, fixed_text, &message, &branch)
            .await
        {
            warn!("could not commit fix to {}: {}", branch, e);
            return None;
        }

        let title = format!(
            "{} {} (PR #{})",
            FIX_TITLE_PREFIX,
            kinds_summary(findings),
            original.number
        );
        let body = compose_fix_body(original, findings);

        match self
            .host
            .create_pull_request(&self.repo, &title, &body, &branch, &self.base_branch)
            .await
        {
            Ok(reference) => {
                info!("fix PR #{} opened for #{}", reference.number, original.number);
                Some(reference)
            }
            Err(e) => {
                warn!("could not open fix PR for #{}: {}", original.number, e);
                None
            }
        }
    }
}

fn kinds_summary(findings: &[Finding]) -> String {
    let mut kinds: Vec<&str> = findings.iter().map(|f| f.kind.as_str()).collect();
    kinds.dedup();
    kinds.join(", ")
}

/// Compose the review comment body. Kept pure for testability; must embed
/// [`MARKER`] for idempotency on re-runs.
fn compose_report(
    pr: &PullRequest,
    findings: &[Finding],
    assessment: &str,
    research: &str,
    validation: Validation,
    fix: Option<&FixReference>,
) -> String {
    let mut body = String::new();

    body.push_str("## Security review: critical vulnerabilities found\n\n");

    body.push_str("### Assessment\n");
    if assessment.is_empty() {
        body.push_str("Assessment unavailable.\n\n");
    } else {
        body.push_str(assessment);
        body.push_str("\n\n");
    }

    body.push_str("### Vulnerabilities detected\n");
    for finding in findings {
        body.push_str(&format!(
            "- **Line {}**: {} (CVSS {})\n",
            finding.line, finding.rationale, finding.score
        ));
    }
    body.push('\n');

    if !research.is_empty() {
        body.push_str("### CVE research\n");
        body.push_str(research);
        body.push_str("\n\n");
    }

    body.push_str(&format!(
        "### Exploit probe\nParameterized-query validation: **{}**\n\n",
        validation.as_str()
    ));

    match fix {
        Some(reference) => {
            body.push_str(&format!(
                "### Fix available\nSee PR #{} for an automatically generated remediation. \
                 Review and merge it instead of this change.\n\n",
                reference.number
            ));
        }
        None => {
            body.push_str(
                "### Fix\nNo automated fix change request was published for this review.\n\n",
            );
        }
    }

    body.push_str(&format!(
        "### Recommendation\n**DO NOT MERGE** this change as-is (author: @{}).\n\n---\n{}\n",
        pr.author, MARKER
    ));

    body
}

fn compose_fix_body(original: &PullRequest, findings: &[Finding]) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "## Automated security fix\n\nThis change remediates the vulnerabilities found in PR #{}.\n\n",
        original.number
    ));

    body.push_str("### Vulnerabilities fixed\n");
    for finding in findings {
        body.push_str(&format!(
            "- {} (line {}, CVSS {})\n",
            finding.kind.as_str(),
            finding.line,
            finding.score
        ));
    }

    body.push_str(&format!(
        "\n### Changes\nString-built queries replaced with parameterized queries.\n\n\
         Original PR: #{}\nAuthor: @{}\n\n---\n{}\n",
        original.number, original.author, MARKER
    ));

    body
}
