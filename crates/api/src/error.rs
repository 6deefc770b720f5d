use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use edgegate_core::error::CoreError;
use edgegate_engine::EngineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`EngineError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `edgegate_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A container engine error surfaced synchronously (log retrieval).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Capacity(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CAPACITY_EXCEEDED",
                    msg.clone(),
                ),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Engine errors ---
            AppError::Engine(err) => classify_engine_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify an engine error into an HTTP status, error code, and message.
///
/// - Unknown containers/images map to 404.
/// - Transport failures map to 502 without the underlying address.
/// - Everything else maps to 502 with the engine's message.
fn classify_engine_error(err: &EngineError) -> (StatusCode, &'static str, String) {
    match err {
        EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        EngineError::Request(e) => {
            tracing::error!(error = %e, "Container engine unreachable");
            (
                StatusCode::BAD_GATEWAY,
                "ENGINE_ERROR",
                "Container engine unreachable".to_string(),
            )
        }
        other => {
            tracing::warn!(error = %other, "Container engine error");
            (StatusCode::BAD_GATEWAY, "ENGINE_ERROR", other.to_string())
        }
    }
}
