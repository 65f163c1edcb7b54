//! End-to-end pipeline tests over recording collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use warden_advisor::{Advisor, AdvisorError, AdvisorResult};
use warden_core::{Pipeline, ScanConfig, TargetState};
use warden_detect::Finding;
use warden_host::{ChangedFile, PullRequest, RecordingHost, RepoId, MARKER};
use warden_research::Research;
use warden_sandbox::{MockResponse, MockSandbox, Validation, Validator};

const VULNERABLE_SOURCE: &str =
    "query = f\"SELECT * FROM users WHERE id = {user_id}\"\ncursor.execute(query)\n";
const CLEAN_SOURCE: &str =
    "cursor.execute(\"SELECT * FROM users WHERE id = ?\", (user_id,))\n";

/// Scripted advisory collaborator.
#[derive(Clone)]
struct MockAdvisor {
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockAdvisor {
    fn new() -> Self {
        Self {
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Advisor for MockAdvisor {
    async fn assess(
        &self,
        _pr_number: u64,
        _title: &str,
        _author: &str,
        _findings: &[Finding],
        _research: &str,
    ) -> AdvisorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AdvisorError::EmptyCompletion);
        }
        Ok("RISK: CRITICAL\nACTION: do not merge".to_string())
    }

    async fn remediate(
        &self,
        _source: &str,
        _findings: &[Finding],
        _examples: &str,
    ) -> AdvisorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AdvisorError::EmptyCompletion);
        }
        Ok("cursor.execute(\"SELECT * FROM users WHERE id = ?\", (user_id,))".to_string())
    }
}

/// Research collaborator returning canned text.
#[derive(Clone)]
struct StaticResearch {
    text: String,
    calls: Arc<AtomicUsize>,
}

impl StaticResearch {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Research for StaticResearch {
    async fn research(&self, _query: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone()
    }
}

fn open_pr(number: u64) -> PullRequest {
    PullRequest {
        number,
        title: format!("Add feature {}", number),
        author: "alice".to_string(),
        head_ref: format!("feature/change-{}", number),
    }
}

fn changed(filename: &str) -> Vec<ChangedFile> {
    vec![ChangedFile {
        filename: filename.to_string(),
        additions: 5,
        deletions: 1,
    }]
}

fn blocked_sandbox() -> MockSandbox {
    MockSandbox::new().add_response(MockResponse::success("rows=0\n"))
}

struct Fixture {
    host: RecordingHost,
    advisor: MockAdvisor,
    research: StaticResearch,
    sandbox: MockSandbox,
    pipeline: Pipeline,
}

fn fixture(host: RecordingHost, advisor: MockAdvisor, sandbox: MockSandbox) -> Fixture {
    fixture_with_config(
        host,
        advisor,
        sandbox,
        ScanConfig::new(RepoId::new("octo", "demo")),
    )
}

fn fixture_with_config(
    host: RecordingHost,
    advisor: MockAdvisor,
    sandbox: MockSandbox,
    config: ScanConfig,
) -> Fixture {
    let research = StaticResearch::new("CVE-2024-0001 background");
    let pipeline = Pipeline::new(
        Arc::new(host.clone()),
        Arc::new(advisor.clone()),
        Arc::new(research.clone()),
        Validator::new(Some(Arc::new(sandbox.clone()))),
        config,
    );
    Fixture {
        host,
        advisor,
        research,
        sandbox,
        pipeline,
    }
}

#[tokio::test]
async fn test_vulnerable_target_is_reported_and_fixed() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(1))
        .with_files(1, changed("app.py"))
        .with_content("app.py", VULNERABLE_SOURCE);
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    let summary = f.pipeline.run().await.unwrap();

    assert_eq!(summary.targets_scanned, 1);
    assert_eq!(summary.findings_detected, 1);
    assert_eq!(summary.fixes_generated, 1);
    assert_eq!(summary.fixes_published, 1);

    match &summary.records[0].state {
        TargetState::Reported {
            findings,
            fix,
            validation,
            published,
            ..
        } => {
            assert_eq!(*findings, 1);
            assert!(fix.is_some());
            assert_eq!(*validation, Validation::Blocked);
            assert!(published);
        }
        other => panic!("unexpected state: {:?}", other),
    }

    // Review comment carries the idempotency marker.
    let comments = f.host.posted_comments(1);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains(MARKER));

    assert!(f.host.was_called("create_branch"));
    assert!(f.host.was_called("create_pull_request"));
    assert_eq!(f.sandbox.run_count(), 1);
    // CVE background + fix examples.
    assert_eq!(f.research.call_count(), 2);
}

#[tokio::test]
async fn test_self_generated_target_makes_no_collaborator_calls() {
    let bot_pr = PullRequest {
        head_ref: "security-fix-pr-9".to_string(),
        ..open_pr(2)
    };
    let host = RecordingHost::new().with_pull_request(bot_pr);
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    let summary = f.pipeline.run().await.unwrap();

    assert_eq!(summary.records[0].state, TargetState::SkippedSelfGenerated);
    assert_eq!(summary.targets_scanned, 0);
    assert_eq!(f.host.calls(), vec!["list_open_pull_requests"]);
    assert_eq!(f.advisor.call_count(), 0);
    assert_eq!(f.research.call_count(), 0);
    assert_eq!(f.sandbox.run_count(), 0);
}

#[tokio::test]
async fn test_already_handled_target_short_circuits() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(3))
        .with_comment(3, format!("Review.\n{}", MARKER), "warden");
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    let summary = f.pipeline.run().await.unwrap();

    assert_eq!(summary.records[0].state, TargetState::SkippedAlreadyHandled);
    assert_eq!(
        f.host.calls(),
        vec!["list_open_pull_requests", "list_comments"]
    );
    assert_eq!(f.advisor.call_count(), 0);
    assert_eq!(f.research.call_count(), 0);
    assert_eq!(f.sandbox.run_count(), 0);
}

#[tokio::test]
async fn test_clean_target_never_reaches_publisher() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(4))
        .with_files(4, changed("app.py"))
        .with_content("app.py", CLEAN_SOURCE);
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    let summary = f.pipeline.run().await.unwrap();

    assert_eq!(summary.records[0].state, TargetState::Clean);
    assert_eq!(summary.fixes_generated, 0);
    assert!(!f.host.was_called("post_comment"));
    assert!(!f.host.was_called("create_branch"));
    assert_eq!(f.advisor.call_count(), 0);
    assert_eq!(f.sandbox.run_count(), 0);
}

#[tokio::test]
async fn test_fix_publish_partial_failure_yields_no_reference() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(5))
        .with_files(5, changed("app.py"))
        .with_content("app.py", VULNERABLE_SOURCE)
        .fail_on("create_pull_request");
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    let summary = f.pipeline.run().await.unwrap();

    assert_eq!(summary.fixes_generated, 1);
    assert_eq!(summary.fixes_published, 0);

    match &summary.records[0].state {
        TargetState::Reported {
            fix, fix_generated, ..
        } => {
            assert!(fix.is_none());
            assert!(fix_generated);
        }
        other => panic!("unexpected state: {:?}", other),
    }

    assert!(summary.render().contains("fix generated, publish failed"));
}

#[tokio::test]
async fn test_listing_failure_aborts_the_run() {
    let host = RecordingHost::new().fail_on("list_open_pull_requests");
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    assert!(f.pipeline.run().await.is_err());
}

#[tokio::test]
async fn test_fetch_failure_skips_only_that_target() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(6))
        .with_pull_request(open_pr(7))
        .with_files(6, changed("missing.py"))
        .with_files(7, changed("app.py"))
        .with_content("app.py", VULNERABLE_SOURCE);
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    let summary = f.pipeline.run().await.unwrap();

    assert_eq!(summary.records[0].state, TargetState::FetchFailed);
    assert!(matches!(
        summary.records[1].state,
        TargetState::Reported { .. }
    ));
    assert_eq!(summary.targets_scanned, 1);
}

#[tokio::test]
async fn test_advisory_failure_degrades_but_still_reports() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(8))
        .with_files(8, changed("app.py"))
        .with_content("app.py", VULNERABLE_SOURCE);
    let f = fixture(host, MockAdvisor::failing(), blocked_sandbox());

    let summary = f.pipeline.run().await.unwrap();

    match &summary.records[0].state {
        TargetState::Reported {
            fix_generated,
            fix,
            published,
            ..
        } => {
            assert!(!fix_generated);
            assert!(fix.is_none());
            assert!(published);
        }
        other => panic!("unexpected state: {:?}", other),
    }

    let body = &f.host.posted_comments(8)[0].body;
    assert!(body.contains("Assessment unavailable."));
    assert!(!f.host.was_called("create_branch"));
}

#[tokio::test]
async fn test_missing_sandbox_reports_skipped_validation() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(9))
        .with_files(9, changed("app.py"))
        .with_content("app.py", VULNERABLE_SOURCE);
    let advisor = MockAdvisor::new();
    let research = StaticResearch::new("");
    let pipeline = Pipeline::new(
        Arc::new(host.clone()),
        Arc::new(advisor),
        Arc::new(research),
        Validator::disabled(),
        ScanConfig::new(RepoId::new("octo", "demo")),
    );

    let summary = pipeline.run().await.unwrap();

    match &summary.records[0].state {
        TargetState::Reported { validation, .. } => {
            assert_eq!(*validation, Validation::Skipped);
        }
        other => panic!("unexpected state: {:?}", other),
    }

    assert!(host.posted_comments(9)[0].body.contains("**skipped**"));
}

#[tokio::test]
async fn test_cancellation_stops_before_next_target() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(10))
        .with_files(10, changed("app.py"))
        .with_content("app.py", VULNERABLE_SOURCE);
    let f = fixture(host, MockAdvisor::new(), blocked_sandbox());

    f.pipeline.cancel_flag().store(true, std::sync::atomic::Ordering::SeqCst);
    let summary = f.pipeline.run().await.unwrap();

    assert!(summary.records.is_empty());
    assert_eq!(f.advisor.call_count(), 0);
}

#[tokio::test]
async fn test_single_target_mode_fetches_one_pull_request() {
    let host = RecordingHost::new()
        .with_pull_request(open_pr(11))
        .with_files(11, changed("app.py"))
        .with_content("app.py", CLEAN_SOURCE);
    let config = ScanConfig::new(RepoId::new("octo", "demo")).single_target(11);
    let f = fixture_with_config(host, MockAdvisor::new(), blocked_sandbox(), config);

    let summary = f.pipeline.run().await.unwrap();

    assert_eq!(summary.records.len(), 1);
    assert!(f.host.was_called("get_pull_request"));
    assert!(!f.host.was_called("list_open_pull_requests"));
}

#[tokio::test]
async fn test_local_fallback_serves_source_when_host_cannot() {
    let dir = tempfile::tempdir().unwrap();
    let fallback = dir.path().join("vulnerable_app.py");
    std::fs::write(&fallback, VULNERABLE_SOURCE).unwrap();

    let host = RecordingHost::new()
        .with_pull_request(open_pr(12))
        .with_files(12, changed("app.py"));
    let config =
        ScanConfig::new(RepoId::new("octo", "demo")).with_local_fallback(&fallback);
    let f = fixture_with_config(host, MockAdvisor::new(), blocked_sandbox(), config);

    let summary = f.pipeline.run().await.unwrap();

    assert!(matches!(
        summary.records[0].state,
        TargetState::Reported { .. }
    ));
    assert_eq!(summary.findings_detected, 1);
}
