//! Engine client trait and its request types.

use std::pin::Pin;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

/// Raw container log stream, framed or not, as produced by the engine.
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Command to run inside a running container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecConfig {
    pub cmd: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
}

/// Log retrieval options (`?since=&until=&tail=&timestamps=`).
///
/// `since` / `until` are unix timestamps in seconds; `tail` caps the
/// number of lines returned from the end of the log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogOptions {
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub tail: Option<u32>,
    #[serde(default)]
    pub timestamps: bool,
}

/// Operations the gateway performs against the container engine.
///
/// The long-running operations take the job's cancellation token and
/// return [`EngineError::Cancelled`] if it fires before they finish.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Verify the engine is reachable.
    async fn ping(&self) -> Result<(), EngineError>;

    async fn stop_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), EngineError>;

    async fn restart_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), EngineError>;

    /// Pull an image reference (`name[:tag]`), waiting for the pull to
    /// finish.
    async fn pull_image(
        &self,
        cancel: &CancellationToken,
        reference: &str,
    ) -> Result<(), EngineError>;

    /// Run a command in a container and wait for it to exit.
    async fn exec(
        &self,
        cancel: &CancellationToken,
        id: &str,
        config: &ExecConfig,
    ) -> Result<(), EngineError>;

    /// Open the container's log stream. Pair with
    /// `edgegate_core::logstream::LogDemux` to get plain bytes.
    async fn container_logs(
        &self,
        id: &str,
        options: &LogOptions,
    ) -> Result<LogStream, EngineError>;
}
