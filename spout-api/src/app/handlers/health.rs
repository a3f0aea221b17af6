use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::Json;
use serde_json::json;

use crate::app::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "containers": state.attacher.containers().len(),
        "routes": state.routes.len().await,
    }))
}

pub async fn handler_404(uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    tracing::debug!(path = %uri.path(), "no route for request");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": "NotFound",
            "message": format!("{} not found", uri.path()),
        })),
    )
}
