use axum::routing::post;
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

/// Routes mounted at `/images`.
///
/// ```text
/// POST   /pull            -> pull_image
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/pull", post(images::pull_image))
}
