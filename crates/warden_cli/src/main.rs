//! Codewarden CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success (regardless of how many vulnerabilities were found)
//! - 1: General error (missing credentials, listing failure)
//! - 2: Invalid arguments

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use warden_advisor::AdvisorClient;
use warden_core::{Pipeline, ScanConfig};
use warden_host::{GithubHost, RepoId};
use warden_research::ResearchClient;
use warden_sandbox::{DockerSandbox, Sandbox, Validator};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
}

/// Codewarden - automated pull request security triage
#[derive(Parser)]
#[command(name = "warden")]
#[command(version, about = "Codewarden - automated pull request security triage")]
#[command(long_about = r#"
Codewarden scans open pull requests for SQL injection introduced through
string interpolation, asks an advisory model for an assessment and a
candidate fix, validates the fix in a Docker sandbox, and publishes a review
comment plus an optional fix pull request.

CREDENTIALS (environment):
  GITHUB_TOKEN                    required
  LLM_API_KEY or NVIDIA_API_KEY   required
  RESEARCH_API_KEY                optional, enables CVE/fix-example context

Detecting vulnerabilities is not a process failure: the exit code is 0
whenever the run completes.
"#)]
struct Cli {
    /// Repository owner (user or organization)
    repo_owner: String,

    /// Repository name
    repo_name: String,

    /// Scan a single pull request instead of every open one
    pr_number: Option<u64>,

    /// Base branch fix pull requests are cut from and target
    #[arg(long, default_value = "main")]
    base_branch: String,

    /// Save a copy of each review to this directory
    #[arg(long, env = "WARDEN_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Local file to scan when the host cannot serve file content
    #[arg(long, env = "WARDEN_LOCAL_FALLBACK")]
    local_fallback: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(ExitCodes::GENERAL_ERROR)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let host = Arc::new(GithubHost::from_env()?);
    let advisor = Arc::new(AdvisorClient::from_env()?);

    let research = ResearchClient::from_env();
    if !research.is_configured() {
        warn!("research collaborator not configured, continuing without context");
    }

    let sandbox: Option<Arc<dyn Sandbox>> = match DockerSandbox::new().await {
        Ok(sandbox) => Some(Arc::new(sandbox)),
        Err(e) => {
            warn!("sandbox unavailable ({}), validation will be skipped", e);
            None
        }
    };
    let validator = Validator::new(sandbox);

    let mut config = ScanConfig::new(RepoId::new(&cli.repo_owner, &cli.repo_name))
        .with_base_branch(&cli.base_branch);
    if let Some(number) = cli.pr_number {
        config = config.single_target(number);
    }
    if let Some(dir) = cli.report_dir {
        config = config.with_report_dir(dir);
    }
    if let Some(path) = cli.local_fallback {
        config = config.with_local_fallback(path);
    }

    let pipeline = Pipeline::new(host, advisor, Arc::new(research), validator, config);

    // Interrupt finishes the in-flight target, then stops; side effects
    // already published to the host are final.
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current target");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let summary = pipeline.run().await?;
    println!("{}", summary.render());

    Ok(())
}
