use std::sync::Arc;

use edgegate_core::jobs::JobRegistry;
use edgegate_engine::EngineClient;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Registry tracking every asynchronous engine operation.
    pub registry: Arc<JobRegistry>,
    /// Container engine the jobs act on.
    pub engine: Arc<dyn EngineClient>,
}
