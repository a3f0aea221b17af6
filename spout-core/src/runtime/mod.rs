//! Container runtime boundary: discovery, lifecycle events and raw output streams.

use crate::error::Result;
use crate::models::Container;
use async_trait::async_trait;
use futures::stream::BoxStream;

mod docker;
mod memory;

pub use docker::DockerRuntime;
pub use memory::MemoryRuntime;

/// Lifecycle change reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Started { id: String },
    Stopped { id: String },
}

/// A chunk of raw output from one of a container's streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub stream: &'static str,
    pub data: Vec<u8>,
}

impl LogChunk {
    pub fn stdout(data: impl Into<Vec<u8>>) -> Self {
        Self {
            stream: "stdout",
            data: data.into(),
        }
    }

    pub fn stderr(data: impl Into<Vec<u8>>) -> Self {
        Self {
            stream: "stderr",
            data: data.into(),
        }
    }
}

pub type EventStream = BoxStream<'static, Result<RuntimeEvent>>;
pub type ChunkStream = BoxStream<'static, Result<LogChunk>>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Containers currently running.
    async fn list_running(&self) -> Result<Vec<Container>>;
    /// Resolve an id (full or short) to a handle.
    async fn inspect(&self, id: &str) -> Result<Container>;
    /// Start/stop notifications from now on.
    async fn events(&self) -> Result<EventStream>;
    /// Live combined output of a container; ends when the container exits.
    async fn attach(&self, id: &str) -> Result<ChunkStream>;
}
