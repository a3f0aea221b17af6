use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use spout_core::Source;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::websocket;
use crate::app::format::LogFormatter;
use crate::app::{ApiError, AppState};

/// Per-connection queue depth; records beyond it are dropped for this client only.
pub(super) const LISTENER_QUEUE: usize = 256;

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    /// Comma separated stream types for the plain stream.
    pub types: Option<String>,
    /// Single stream type for socket sessions.
    #[serde(rename = "type")]
    pub stream_type: Option<String>,
    /// `off` disables colors.
    pub colors: Option<String>,
}

impl LogQuery {
    fn types(&self) -> Vec<String> {
        self.types
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn colors(&self) -> bool {
        self.colors.as_deref() != Some("off")
    }
}

/// GET /logs
pub async fn stream_all(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, ApiError> {
    stream_logs(state, Source::All, query, &headers, ws)
}

/// GET /logs/:predicate:value
pub async fn stream_selected(
    State(state): State<AppState>,
    Path(selector): Path<String>,
    Query(query): Query<LogQuery>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, ApiError> {
    stream_logs(state, Source::parse_selector(&selector), query, &headers, ws)
}

fn stream_logs(
    state: AppState,
    source: Source,
    query: LogQuery,
    headers: &HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, ApiError> {
    if let Source::Id(id) = &source {
        if state.attacher.get(id).is_none() {
            return Err(ApiError::not_found(format!("container {id} not found")));
        }
    }

    if let Some(ws) = ws {
        return Ok(websocket::upgrade(ws, state.attacher, source, query.stream_type));
    }

    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("application/json"));
    let mut formatter = LogFormatter::new(source.is_multi(), wants_json, query.colors());
    let content_type = formatter.content_type();
    let types = query.types();

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(LISTENER_QUEUE);
    let listen_id = state.attacher.listen(source, tx, cancel.clone());
    // dropped together with the body when the client goes away
    let guard = cancel.drop_guard();

    let body = async_stream::stream! {
        let _guard = guard;
        while let Some(record) = rx.recv().await {
            if !types.is_empty() && !types.iter().any(|t| *t == record.stream) {
                continue;
            }
            yield Ok::<_, Infallible>(formatter.format(&record));
        }
        tracing::debug!(listen_id, "log stream closed");
    };

    Ok(([(header::CONTENT_TYPE, content_type)], Body::from_stream(body)).into_response())
}
