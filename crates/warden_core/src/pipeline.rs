//! The per-target state machine and the run loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use warden_advisor::Advisor;
use warden_detect::{detect, Finding};
use warden_host::{CodeHost, Publisher, PullRequest};
use warden_research::Research;
use warden_sandbox::Validator;

use crate::config::ScanConfig;
use crate::error::CoreResult;
use crate::summary::{RunSummary, TargetState};
use crate::target::{RemediationResult, ScanTarget};

/// The scan-and-remediate pipeline.
///
/// Owns every collaborator handle for the run's lifetime; handles drop with
/// the pipeline whether the run ends normally or by error. Targets are
/// processed strictly one at a time so fix branches cannot collide and
/// comments cannot interleave on the host.
pub struct Pipeline {
    host: Arc<dyn CodeHost>,
    advisor: Arc<dyn Advisor>,
    research: Arc<dyn Research>,
    validator: Validator,
    publisher: Publisher,
    config: ScanConfig,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        host: Arc<dyn CodeHost>,
        advisor: Arc<dyn Advisor>,
        research: Arc<dyn Research>,
        validator: Validator,
        config: ScanConfig,
    ) -> Self {
        let mut publisher = Publisher::new(host.clone(), config.repo.clone())
            .with_base_branch(config.base_branch.clone());
        if let Some(dir) = &config.report_dir {
            publisher = publisher.with_report_dir(dir.clone());
        }

        Self {
            host,
            advisor,
            research,
            validator,
            publisher,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between targets. Setting it stops the run before the
    /// next target begins; already-published side effects are final.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Run the pipeline over every open change request (or the single
    /// configured one) and return the aggregated summary.
    ///
    /// Only a failure obtaining the target list aborts; each target's stage
    /// failures are absorbed into its [`TargetState`].
    pub async fn run(&self) -> CoreResult<RunSummary> {
        let started = Instant::now();
        let repo = &self.config.repo;

        info!("scanning {}", repo.slug());

        let targets = match self.config.pr_number {
            Some(number) => vec![self.host.get_pull_request(repo, number).await?],
            None => self.host.list_open_pull_requests(repo).await?,
        };

        info!("{} open change request(s)", targets.len());

        let mut summary = RunSummary::new();

        for pr in &targets {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("run cancelled, stopping before #{}", pr.number);
                break;
            }

            let state = self.scan_target(pr).await;
            summary.record(pr, state);
        }

        summary.duration = started.elapsed();
        Ok(summary)
    }

    /// Walk one change request through the state machine to its terminal
    /// state. Never returns an error: each stage degrades in place.
    async fn scan_target(&self, pr: &PullRequest) -> TargetState {
        info!("processing #{}: {}", pr.number, pr.title);

        if self.publisher.is_self_generated(pr) {
            info!("skipping #{}: agent-generated fix", pr.number);
            return TargetState::SkippedSelfGenerated;
        }

        if self.publisher.already_handled(pr.number).await {
            info!("skipping #{}: already reviewed", pr.number);
            return TargetState::SkippedAlreadyHandled;
        }

        let files = match self.host.get_changed_files(&self.config.repo, pr.number).await {
            Ok(files) => files,
            Err(e) => {
                warn!("could not fetch file list for #{}: {}", pr.number, e);
                return TargetState::FetchFailed;
            }
        };

        let Some(changed) = files
            .into_iter()
            .find(|f| f.filename.ends_with(&self.config.file_extension))
        else {
            info!("no {} files in #{}", self.config.file_extension, pr.number);
            return TargetState::NoMatchingFiles;
        };

        let Some(source) = self.fetch_source(&changed.filename, &pr.head_ref).await else {
            return TargetState::FetchFailed;
        };

        let target = ScanTarget {
            pr_number: pr.number,
            filename: changed.filename,
            source,
        };

        let findings = detect(&target.source);
        if findings.is_empty() {
            info!("no vulnerabilities in #{}", pr.number);
            return TargetState::Clean;
        }

        warn!(
            "{} finding(s) in #{} ({})",
            findings.len(),
            pr.number,
            target.filename
        );

        // Research and assessment have no data dependency on each other;
        // remediation needs the fix examples, so it waits for the join.
        let kind = findings[0].kind.as_str();
        let (cve, examples, assessment) = tokio::join!(
            self.research.cve_background(kind),
            self.research.fix_examples(kind),
            self.assess(pr, &findings),
        );

        let remediation = self.remediate(&target, &findings, &examples).await;

        let fix = if remediation.generated() {
            self.publisher
                .publish_fix(pr, &target.filename, &remediation.fixed_text, &findings)
                .await
        } else {
            None
        };

        let published = self
            .publisher
            .publish_report(pr, &findings, &assessment, &cve, remediation.validation, fix.as_ref())
            .await;

        TargetState::Reported {
            findings: findings.len(),
            fix_generated: remediation.generated(),
            fix: fix.map(|f| f.number),
            validation: remediation.validation,
            published,
        }
    }

    /// Generate a candidate fix and probe it. Advisory failure degrades to
    /// an empty candidate; the probe is generic, so it runs either way and
    /// its outcome is reported transparently.
    async fn remediate(
        &self,
        target: &ScanTarget,
        findings: &[Finding],
        examples: &str,
    ) -> RemediationResult {
        let fixed_text = match self
            .advisor
            .remediate(&target.source, findings, examples)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "advisory unavailable for remediation of #{}: {}",
                    target.pr_number, e
                );
                String::new()
            }
        };

        let validation = self.validator.probe().await;

        RemediationResult {
            fixed_text,
            validation,
        }
    }

    async fn assess(&self, pr: &PullRequest, findings: &[Finding]) -> String {
        match self
            .advisor
            .assess(pr.number, &pr.title, &pr.author, findings, "")
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("advisory unavailable for assessment of #{}: {}", pr.number, e);
                String::new()
            }
        }
    }

    async fn fetch_source(&self, path: &str, head_ref: &str) -> Option<String> {
        match self
            .host
            .get_file_content(&self.config.repo, path, Some(head_ref))
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("could not fetch {}: {}", path, e);
                let fallback = self.config.local_fallback.as_ref()?;
                match tokio::fs::read_to_string(fallback).await {
                    Ok(text) => {
                        info!("using local fallback {}", fallback.display());
                        Some(text)
                    }
                    Err(e) => {
                        warn!("local fallback unreadable: {}", e);
                        None
                    }
                }
            }
        }
    }
}
