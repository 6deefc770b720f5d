//! Docker Engine API client.
//!
//! Implements [`EngineClient`] over the engine's HTTP API using
//! [`reqwest`]. The daemon must be reachable over TCP, e.g. `DOCKER_HOST`
//! set to `tcp://127.0.0.1:2375`.

use std::future::Future;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::client::{EngineClient, ExecConfig, LogOptions, LogStream};
use crate::error::EngineError;

/// HTTP client for a single Docker daemon.
pub struct DockerEngine {
    client: reqwest::Client,
    base_url: String,
}

/// Error body returned by the engine on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// One line of the `POST /images/create` progress stream.
#[derive(Debug, Deserialize)]
struct PullProgress {
    status: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecCreate<'a> {
    cmd: &'a [String],
    env: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    working_dir: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    attach_stdout: bool,
    attach_stderr: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecInspect {
    exit_code: Option<i64>,
}

impl DockerEngine {
    /// Create a client for the daemon at `host`.
    ///
    /// * `host` - `tcp://host:port` or `http://host:port`.
    /// * `api_version` - optional API version prefix, e.g. `1.43`.
    pub fn new(host: &str, api_version: Option<&str>) -> Self {
        Self::with_client(reqwest::Client::new(), host, api_version)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, host: &str, api_version: Option<&str>) -> Self {
        let base = normalize_host(host);
        let base_url = match api_version {
            Some(version) => format!("{base}/v{}", version.trim_start_matches('v')),
            None => base,
        };
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /containers/{id}/{action}` for stop / restart.
    async fn container_action(
        &self,
        cancel: &CancellationToken,
        id: &str,
        action: &str,
    ) -> Result<(), EngineError> {
        tracing::debug!(container = %id, action, "Sending container action");

        cancellable(cancel, async {
            let response = self
                .client
                .post(self.url(&format!("/containers/{id}/{action}")))
                .send()
                .await?;

            // 304: the container is already in the requested state.
            if response.status() == reqwest::StatusCode::NOT_MODIFIED {
                return Ok(());
            }
            ensure_success(response, "container", id).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        let response = self.client.get(self.url("/_ping")).send().await?;
        ensure_success(response, "endpoint", "/_ping").await?;
        Ok(())
    }

    async fn stop_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), EngineError> {
        self.container_action(cancel, id, "stop").await
    }

    async fn restart_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), EngineError> {
        self.container_action(cancel, id, "restart").await
    }

    async fn pull_image(
        &self,
        cancel: &CancellationToken,
        reference: &str,
    ) -> Result<(), EngineError> {
        tracing::debug!(image = %reference, "Pulling image");

        cancellable(cancel, async {
            let response = self
                .client
                .post(self.url("/images/create"))
                .query(&[("fromImage", reference)])
                .send()
                .await?;
            let response = ensure_success(response, "image", reference).await?;

            // Failures after the pull started are only reported in-band.
            let mut body = response.bytes_stream();
            let mut pending: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                pending.extend_from_slice(&chunk?);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    check_pull_progress(&line)?;
                }
            }
            check_pull_progress(&pending)
        })
        .await
    }

    async fn exec(
        &self,
        cancel: &CancellationToken,
        id: &str,
        config: &ExecConfig,
    ) -> Result<(), EngineError> {
        tracing::debug!(container = %id, cmd = ?config.cmd, "Running exec");

        cancellable(cancel, async {
            let create = ExecCreate {
                cmd: &config.cmd,
                env: &config.env,
                working_dir: config.working_dir.as_deref(),
                user: config.user.as_deref(),
                attach_stdout: true,
                attach_stderr: true,
            };
            let response = self
                .client
                .post(self.url(&format!("/containers/{id}/exec")))
                .json(&create)
                .send()
                .await?;
            let created: ExecCreated = ensure_success(response, "container", id)
                .await?
                .json()
                .await?;

            // Starting attached returns once the command exits.
            let response = self
                .client
                .post(self.url(&format!("/exec/{}/start", created.id)))
                .json(&serde_json::json!({ "Detach": false, "Tty": false }))
                .send()
                .await?;
            let mut output = ensure_success(response, "exec", &created.id)
                .await?
                .bytes_stream();
            while let Some(chunk) = output.next().await {
                chunk?;
            }

            let response = self
                .client
                .get(self.url(&format!("/exec/{}/json", created.id)))
                .send()
                .await?;
            let inspect: ExecInspect = ensure_success(response, "exec", &created.id)
                .await?
                .json()
                .await?;

            match inspect.exit_code {
                Some(0) | None => Ok(()),
                Some(exit_code) => Err(EngineError::ExecFailed { exit_code }),
            }
        })
        .await
    }

    async fn container_logs(
        &self,
        id: &str,
        options: &LogOptions,
    ) -> Result<LogStream, EngineError> {
        let mut query: Vec<(&str, String)> = vec![
            ("stdout", "true".to_string()),
            ("stderr", "true".to_string()),
            ("timestamps", options.timestamps.to_string()),
        ];
        if let Some(since) = options.since {
            query.push(("since", since.to_string()));
        }
        if let Some(until) = options.until {
            query.push(("until", until.to_string()));
        }
        if let Some(tail) = options.tail {
            query.push(("tail", tail.to_string()));
        }

        let response = self
            .client
            .get(self.url(&format!("/containers/{id}/logs")))
            .query(&query)
            .send()
            .await?;
        let response = ensure_success(response, "container", id).await?;

        let body = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }
}

// ---- private helpers ----

/// Accept `tcp://` hosts the way the Docker CLI does and strip any
/// trailing slash.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    match host.strip_prefix("tcp://") {
        Some(rest) => format!("http://{rest}"),
        None => host.to_string(),
    }
}

/// Run `op` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    op: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        result = op => result,
    }
}

/// Map a non-2xx response to an [`EngineError`], passing successful
/// responses through unchanged.
async fn ensure_success(
    response: reqwest::Response,
    kind: &'static str,
    id: &str,
) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(EngineError::NotFound {
            kind,
            id: id.to_string(),
        });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);

    Err(EngineError::Api {
        status: status.as_u16(),
        message,
    })
}

fn check_pull_progress(line: &[u8]) -> Result<(), EngineError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    match serde_json::from_slice::<PullProgress>(line) {
        Ok(PullProgress {
            error: Some(error), ..
        }) => Err(EngineError::PullFailed(error)),
        Ok(PullProgress { status, .. }) => {
            if let Some(status) = status {
                tracing::trace!(status = %status, "Pull progress");
            }
            Ok(())
        }
        // Progress lines are informational; skip anything unparseable.
        Err(_) => Ok(()),
    }
}
