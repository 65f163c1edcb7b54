//! Docker implementation of the sandbox.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{SandboxError, SandboxResult};
use crate::runner::{ExecutionResult, Sandbox};

const PROBE_IMAGE: &str = "python";
const PROBE_IMAGE_TAG: &str = "3.12-slim";

/// Wall-clock ceiling for one probe container.
const RUN_TIMEOUT_SECONDS: u64 = 60;

/// Docker-backed sandbox. Each run uses a freshly created container that is
/// removed after its logs are collected; no state survives between probes.
pub struct DockerSandbox {
    client: Docker,
}

impl DockerSandbox {
    /// Connect to the local Docker daemon and verify it responds.
    pub async fn new() -> SandboxResult<Self> {
        let client = Docker::connect_with_local_defaults()?;
        client
            .ping()
            .await
            .map_err(|e| SandboxError::DockerNotAvailable(e.to_string()))?;
        Ok(Self { client })
    }

    fn container_name() -> String {
        let id = Uuid::new_v4().to_string()[..8].to_string();
        format!("warden-probe-{}", id)
    }

    async fn ensure_image(&self) -> SandboxResult<()> {
        let full_image = format!("{}:{}", PROBE_IMAGE, PROBE_IMAGE_TAG);
        if self.client.inspect_image(&full_image).await.is_ok() {
            return Ok(());
        }

        info!("Pulling image {}", full_image);
        let options = CreateImageOptions {
            from_image: PROBE_IMAGE,
            tag: PROBE_IMAGE_TAG,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                return Err(SandboxError::ImagePullFailed(e.to_string()));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn is_available(&self) -> bool {
        self.client.ping().await.is_ok()
    }

    async fn run(&self, code: &str) -> SandboxResult<ExecutionResult> {
        let full_image = format!("{}:{}", PROBE_IMAGE, PROBE_IMAGE_TAG);
        let container_name = Self::container_name();
        let started_at = Utc::now();

        debug!("Running probe container {}", container_name);

        self.ensure_image().await?;

        let container_config = Config {
            image: Some(full_image),
            cmd: Some(vec![
                "python".to_string(),
                "-c".to_string(),
                code.to_string(),
            ]),
            network_disabled: Some(true),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: &container_name,
            platform: None,
        };

        let container = self
            .client
            .create_container(Some(create_options), container_config)
            .await?;
        let container_id = container.id;

        self.client
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await?;

        let wait_future = async {
            let mut wait_stream = self
                .client
                .wait_container(&container_id, None::<WaitContainerOptions<String>>);

            if let Some(result) = wait_stream.next().await {
                match result {
                    Ok(exit) => return Ok(exit.status_code),
                    Err(e) => return Err(SandboxError::ExecutionFailed(e.to_string())),
                }
            }
            Err(SandboxError::ExecutionFailed("container wait failed".into()))
        };

        let exit_code = match timeout(Duration::from_secs(RUN_TIMEOUT_SECONDS), wait_future).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = self.client.stop_container(&container_id, None).await;
                let _ = self
                    .client
                    .remove_container(
                        &container_id,
                        Some(RemoveContainerOptions {
                            force: true,
                            ..Default::default()
                        }),
                    )
                    .await;
                return Err(SandboxError::Timeout(RUN_TIMEOUT_SECONDS));
            }
        };

        let log_options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();

        let mut log_stream = self.client.logs(&container_id, Some(log_options));
        while let Some(result) = log_stream.next().await {
            match result {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                _ => {}
            }
        }

        let _ = self
            .client
            .remove_container(
                &container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds() as u64;

        Ok(ExecutionResult {
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms,
        })
    }
}
