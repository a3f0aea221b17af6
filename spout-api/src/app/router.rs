use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_route, delete_route, get_route, handler_404, health, list_routes, stream_all,
    stream_selected,
};
use super::state::AppState;

/// Builds the CORS layer from the configured origins; empty allows any origin.
fn build_cors_layer(cors_origins: Vec<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if cors_origins.is_empty() {
        base.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .into_iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        base.allow_origin(origins)
    }
}

/// Build the router with routes and middleware wired.
pub fn app_router(state: AppState, cors_origins: Vec<String>) -> Router {
    let log_routes = Router::new()
        .route("/logs", get(stream_all))
        .route("/logs/:selector", get(stream_selected));

    let route_routes = Router::new()
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/:id", get(get_route).delete(delete_route));

    Router::new()
        .route("/health", get(health))
        .merge(log_routes)
        .merge(route_routes)
        .fallback(handler_404)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}
