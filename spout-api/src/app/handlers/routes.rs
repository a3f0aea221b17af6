use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use spout_core::Route;
use tracing::instrument;

use crate::app::{ApiError, AppState};

pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<Route>> {
    Json(state.routes.get_all().await)
}

/// The body is parsed by hand so malformed JSON gets the same error shape as
/// an invalid route.
#[instrument(skip_all)]
pub async fn create_route(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Route>), ApiError> {
    let route: Route = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Bad request: {e}")))?;
    let stored = state.routes.add(route).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Route>, ApiError> {
    state
        .routes
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("route {id} not found")))
}

#[instrument(skip_all, fields(route_id = %id))]
pub async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.routes.remove(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("route {id} not found")))
    }
}
