//! Run summary aggregation.

use std::time::Duration;

use serde::Serialize;

use warden_host::PullRequest;
use warden_sandbox::Validation;

/// Terminal state of one target after its pipeline completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// Change request was created by this agent; never re-scanned.
    SkippedSelfGenerated,
    /// A prior run already reviewed this change request.
    SkippedAlreadyHandled,
    /// File list or content could not be fetched; only this target is lost.
    FetchFailed,
    /// No changed file matched the scanned extension.
    NoMatchingFiles,
    /// Scanned, nothing found.
    Clean,
    /// Findings reported (with whatever degraded data survived the stages).
    Reported {
        findings: usize,
        fix_generated: bool,
        fix: Option<u64>,
        validation: Validation,
        published: bool,
    },
}

impl TargetState {
    fn describe(&self) -> String {
        match self {
            Self::SkippedSelfGenerated => "skipped (agent-generated fix)".to_string(),
            Self::SkippedAlreadyHandled => "skipped (already reviewed)".to_string(),
            Self::FetchFailed => "skipped (fetch failed)".to_string(),
            Self::NoMatchingFiles => "skipped (no matching files)".to_string(),
            Self::Clean => "clean".to_string(),
            Self::Reported {
                findings,
                fix_generated,
                fix,
                validation,
                published,
            } => {
                let fix_text = match (fix_generated, fix) {
                    (_, Some(number)) => format!("fix PR #{}", number),
                    (true, None) => "fix generated, publish failed".to_string(),
                    (false, None) => "no fix generated".to_string(),
                };
                let review = if *published {
                    "review posted"
                } else {
                    "review not posted"
                };
                format!(
                    "{} finding(s), {}, validation {}, {}",
                    findings,
                    fix_text,
                    validation.as_str(),
                    review
                )
            }
        }
    }
}

/// Outcome record for one listed target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetRecord {
    pub pr_number: u64,
    pub title: String,
    pub state: TargetState,
}

/// Aggregate of one pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Targets that reached detection (skips excluded).
    pub targets_scanned: usize,
    pub findings_detected: usize,
    pub fixes_generated: usize,
    pub fixes_published: usize,
    pub duration: Duration,
    pub records: Vec<TargetRecord>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a completed target into the counters.
    pub fn record(&mut self, pr: &PullRequest, state: TargetState) {
        match &state {
            TargetState::Clean => {
                self.targets_scanned += 1;
            }
            TargetState::Reported {
                findings,
                fix_generated,
                fix,
                ..
            } => {
                self.targets_scanned += 1;
                self.findings_detected += findings;
                if *fix_generated {
                    self.fixes_generated += 1;
                }
                if fix.is_some() {
                    self.fixes_published += 1;
                }
            }
            _ => {}
        }

        self.records.push(TargetRecord {
            pr_number: pr.number,
            title: pr.title.clone(),
            state,
        });
    }

    /// Human-readable rendering for the CLI.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("Scan complete\n");
        out.push_str(&format!("  Targets scanned:  {}\n", self.targets_scanned));
        out.push_str(&format!("  Vulnerabilities:  {}\n", self.findings_detected));
        out.push_str(&format!("  Fixes generated:  {}\n", self.fixes_generated));
        out.push_str(&format!("  Fixes published:  {}\n", self.fixes_published));
        out.push_str(&format!(
            "  Duration:         {:.1}s\n",
            self.duration.as_secs_f64()
        ));

        if !self.records.is_empty() {
            out.push('\n');
            for record in &self.records {
                out.push_str(&format!(
                    "  #{} {} - {}\n",
                    record.pr_number,
                    record.title,
                    record.state.describe()
                ));
            }
        }

        out
    }
}
