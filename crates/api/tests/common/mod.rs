#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use edgegate_api::config::ServerConfig;
use edgegate_api::router::build_app_router;
use edgegate_api::state::AppState;
use edgegate_core::jobs::{JobRegistry, JobStatus, JobView};
use edgegate_core::runner::TaskRunner;
use edgegate_core::types::JobId;
use edgegate_engine::{EngineClient, EngineError, ExecConfig, LogOptions, LogStream};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Fake engine
// ---------------------------------------------------------------------------

/// In-memory [`EngineClient`] with behaviour keyed on the target ID:
///
/// - `missing`: the engine does not know the object.
/// - `slow`: blocks until the job is cancelled.
/// - `failing`: exec exits with status 1.
/// - `ghost`: image pull fails mid-stream.
pub struct FakeEngine {
    pub healthy: AtomicBool,
    pub calls: Mutex<Vec<String>>,
    pub logs: Mutex<HashMap<String, Vec<u8>>>,
    pub last_log_options: Mutex<Option<LogOptions>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            logs: Mutex::new(HashMap::new()),
            last_log_options: Mutex::new(None),
        }
    }

    pub fn set_logs(&self, id: &str, bytes: Vec<u8>) {
        self.logs.lock().unwrap().insert(id.to_string(), bytes);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, cancel: &CancellationToken, call: String, id: &str) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(call);
        match id {
            "missing" => Err(EngineError::NotFound {
                kind: "container",
                id: id.to_string(),
            }),
            "slow" => {
                cancel.cancelled().await;
                Err(EngineError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EngineClient for FakeEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::Api {
                status: 500,
                message: "daemon down".to_string(),
            })
        }
    }

    async fn stop_container(&self, cancel: &CancellationToken, id: &str) -> Result<(), EngineError> {
        self.run(cancel, format!("stop {id}"), id).await
    }

    async fn restart_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), EngineError> {
        self.run(cancel, format!("restart {id}"), id).await
    }

    async fn pull_image(&self, cancel: &CancellationToken, reference: &str) -> Result<(), EngineError> {
        if reference == "ghost" {
            return Err(EngineError::PullFailed("manifest unknown".to_string()));
        }
        self.run(cancel, format!("pull {reference}"), reference).await
    }

    async fn exec(
        &self,
        cancel: &CancellationToken,
        id: &str,
        config: &ExecConfig,
    ) -> Result<(), EngineError> {
        if id == "failing" {
            return Err(EngineError::ExecFailed { exit_code: 1 });
        }
        self.run(cancel, format!("exec {id} {}", config.cmd.join(" ")), id)
            .await
    }

    async fn container_logs(&self, id: &str, options: &LogOptions) -> Result<LogStream, EngineError> {
        *self.last_log_options.lock().unwrap() = Some(options.clone());
        let bytes = self
            .logs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                kind: "container",
                id: id.to_string(),
            })?;
        Ok(Box::pin(std::io::Cursor::new(bytes)))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        ..ServerConfig::default()
    }
}

/// Build the full application router around `engine`.
///
/// Uses the same `build_app_router` as `main.rs`, so integration tests
/// exercise the production middleware stack. The returned state gives
/// direct access to the registry.
pub fn build_test_app_with(engine: Arc<FakeEngine>, config: ServerConfig) -> (Router, AppState) {
    let runner = TaskRunner::start(config.job_concurrency, config.job_queue_capacity);
    let state = AppState {
        registry: Arc::new(JobRegistry::new(runner)),
        engine,
    };
    (build_app_router(state.clone(), &config), state)
}

pub fn build_test_app() -> (Router, AppState, Arc<FakeEngine>) {
    let engine = Arc::new(FakeEngine::new());
    let (app, state) = build_test_app_with(Arc::clone(&engine), test_config());
    (app, state, engine)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post(app: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Extract the job ID from a `202 { "data": { "job_id": ... } }` body.
pub async fn accepted_job_id(response: Response) -> JobId {
    let json = body_json(response).await;
    json["data"]["job_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("response should carry a job id")
}

/// Poll the registry until job `id` reaches `status`.
pub async fn wait_for_status(state: &AppState, id: JobId, status: JobStatus) -> JobView {
    for _ in 0..200 {
        if let Ok(view) = state.registry.get(id).await {
            if view.status == status {
                return view;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} never reached {status}");
}

/// One multiplexed log frame as produced by the engine.
pub fn frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}
