use super::*;
use crate::error::SpoutError;
use crate::models::short_id;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// In-process runtime: containers are started, fed and stopped by hand.
///
/// Output emitted while nobody is attached is discarded, the same as a live
/// attach on a real engine.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: Vec<Container>,
    outputs: HashMap<String, Vec<mpsc::UnboundedSender<Result<LogChunk>>>>,
    watchers: Vec<mpsc::UnboundedSender<Result<RuntimeEvent>>>,
}

impl MemoryState {
    fn find(&self, id: &str) -> Option<&Container> {
        let short = short_id(id);
        self.containers.iter().find(|c| c.short_id() == short)
    }

    fn notify(&mut self, event: RuntimeEvent) {
        self.watchers.retain(|tx| tx.send(Ok(event.clone())).is_ok());
    }
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a running container and announces it.
    pub fn start_container(&self, id: &str, name: &str) -> Container {
        let container = Container::new(id, name);
        let mut state = self.state();
        state.containers.retain(|c| c.id != container.id);
        state.containers.push(container.clone());
        state.notify(RuntimeEvent::Started {
            id: container.id.clone(),
        });
        container
    }

    /// Removes a container, ends its output streams and announces the stop.
    pub fn stop_container(&self, id: &str) {
        let mut state = self.state();
        let Some(container) = state.find(id).cloned() else {
            return;
        };
        state.containers.retain(|c| c.id != container.id);
        state.outputs.remove(&container.id);
        state.notify(RuntimeEvent::Stopped { id: container.id });
    }

    /// Writes raw output to every live attach of the container.
    pub fn emit(&self, id: &str, chunk: LogChunk) {
        let mut state = self.state();
        let Some(full_id) = state.find(id).map(|c| c.id.clone()) else {
            return;
        };
        if let Some(senders) = state.outputs.get_mut(&full_id) {
            senders.retain(|tx| tx.send(Ok(chunk.clone())).is_ok());
        }
    }

    /// Ends the container's output streams without stopping it.
    pub fn close_output(&self, id: &str) {
        let mut state = self.state();
        if let Some(full_id) = state.find(id).map(|c| c.id.clone()) {
            state.outputs.remove(&full_id);
        }
    }
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
    async fn list_running(&self) -> Result<Vec<Container>> {
        Ok(self.state().containers.clone())
    }

    async fn inspect(&self, id: &str) -> Result<Container> {
        self.state()
            .find(id)
            .cloned()
            .ok_or_else(|| SpoutError::ContainerNotFound(id.to_string()))
    }

    async fn events(&self) -> Result<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().watchers.push(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn attach(&self, id: &str) -> Result<ChunkStream> {
        let mut state = self.state();
        let full_id = state
            .find(id)
            .map(|c| c.id.clone())
            .ok_or_else(|| SpoutError::ContainerNotFound(id.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.outputs.entry(full_id).or_default().push(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
