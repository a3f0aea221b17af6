//! Socket sessions: one JSON text frame per record.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use spout_core::{AttachManager, Source};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::logs::LISTENER_QUEUE;

pub fn upgrade(
    ws: WebSocketUpgrade,
    attacher: AttachManager,
    source: Source,
    stream_type: Option<String>,
) -> Response {
    let stream_type = stream_type.filter(|t| !t.is_empty());
    ws.on_upgrade(move |socket| serve_socket(socket, attacher, source, stream_type))
}

async fn serve_socket(
    socket: WebSocket,
    attacher: AttachManager,
    source: Source,
    stream_type: Option<String>,
) {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let (tx, mut rx) = mpsc::channel(LISTENER_QUEUE);
    let listen_id = attacher.listen(source, tx, cancel);
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            record = rx.recv() => {
                let Some(record) = record else { break };
                if stream_type.as_deref().is_some_and(|t| t != record.stream) {
                    continue;
                }
                let text = match serde_json::to_string(&*record) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode log record");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!(listen_id, "socket session ended");
}
