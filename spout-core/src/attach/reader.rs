use super::decode::LineDecoder;
use super::*;
use futures::StreamExt;

impl AttachManager {
    /// Reads one container's output until it ends or the container detaches.
    pub(super) async fn pump(
        self,
        container: Container,
        mut stream: ChunkStream,
        fanout: Arc<Fanout<Arc<LogRecord>>>,
        stop: CancellationToken,
        generation: u64,
    ) {
        let mut decoder = LineDecoder::default();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(chunk)) => {
                    for line in decoder.push(chunk.stream, &chunk.data) {
                        fanout.publish(Arc::new(LogRecord::new(&container, chunk.stream, line)));
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(container_id = %container.short_id(), error = %e, "log stream error");
                    break;
                }
                None => break,
            }
        }
        for (stream_type, line) in decoder.finish() {
            fanout.publish(Arc::new(LogRecord::new(&container, stream_type, line)));
        }
        let dropped = fanout.dropped();
        tracing::info!(
            container_id = %container.short_id(),
            name = %container.name,
            dropped,
            "log stream ended"
        );
        self.release(container.short_id(), generation);
    }
}
