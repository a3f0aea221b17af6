use spout_core::{AttachManager, RouteManager};
use std::sync::Arc;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub attacher: AttachManager,
    pub routes: Arc<RouteManager>,
}
