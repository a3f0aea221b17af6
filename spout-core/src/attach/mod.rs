//! Attach manager: one reader per running container, records multicast to listeners.

use crate::error::Result;
use crate::models::{short_id, Container, LogRecord};
use crate::runtime::{ChunkStream, ContainerRuntime, EventStream, RuntimeEvent};
use crate::source::Source;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod decode;
pub mod fanout;
mod listen;
mod reader;

pub use fanout::Fanout;

/// Queue end a listener receives records on.
pub type RecordSender = mpsc::Sender<Arc<LogRecord>>;
pub type RecordReceiver = mpsc::Receiver<Arc<LogRecord>>;

/// A live reader: the container, its listener set and the switch that stops it.
struct Attached {
    container: Container,
    fanout: Arc<Fanout<Arc<LogRecord>>>,
    stop: CancellationToken,
    generation: u64,
}

/// A `listen` call; kept so containers attached later are checked against it.
struct Listen {
    id: u64,
    source: Source,
    tx: RecordSender,
    /// Child of the caller's token; also fired when the registry drops the listen.
    stop: CancellationToken,
}

#[derive(Default)]
struct Registry {
    /// keyed by short id
    attached: HashMap<String, Attached>,
    listens: Vec<Listen>,
    generation: u64,
}

impl Registry {
    /// Drops listens whose owner has gone away.
    fn prune_listens(&mut self) {
        self.listens.retain(|l| {
            let live = !l.stop.is_cancelled() && !l.tx.is_closed();
            if !live {
                l.stop.cancel();
            }
            live
        });
    }

    /// An exact-id listen has nothing left to wait for once its container is gone.
    fn release_id_listens(&mut self, short: &str) {
        self.listens.retain(|l| {
            let released = matches!(&l.source, Source::Id(id) if id == short);
            if released {
                l.stop.cancel();
            }
            !released
        });
    }
}

/// Tracks running containers and gives the only access to their output.
#[derive(Clone)]
pub struct AttachManager {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<Mutex<Registry>>,
    next_listen: Arc<AtomicU64>,
}

impl std::fmt::Debug for AttachManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachManager")
            .field("containers", &self.containers().len())
            .finish_non_exhaustive()
    }
}

impl AttachManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            registry: Arc::new(Mutex::new(Registry::default())),
            next_listen: Arc::new(AtomicU64::new(1)),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribes to runtime events, attaches every running container, then
    /// follows start/stop events in the background.
    ///
    /// Events are subscribed before listing so a container starting in
    /// between is not missed; a duplicate attach is a no-op.
    pub async fn start(&self) -> Result<()> {
        let events = self.runtime.events().await?;
        let running = self.runtime.list_running().await?;
        tracing::info!(count = running.len(), "attaching to running containers");
        for container in running {
            if let Err(e) = self.attach(&container.id).await {
                tracing::warn!(container_id = %container.short_id(), error = %e, "attach failed");
            }
        }
        tokio::spawn(self.clone().watch_events(events));
        Ok(())
    }

    async fn watch_events(self, mut events: EventStream) {
        use futures::StreamExt;
        while let Some(event) = events.next().await {
            match event {
                Ok(RuntimeEvent::Started { id }) => {
                    if let Err(e) = self.attach(&id).await {
                        tracing::warn!(container_id = %short_id(&id), error = %e, "attach failed");
                    }
                }
                Ok(RuntimeEvent::Stopped { id }) => {
                    self.detach(&id);
                }
                Err(e) => tracing::warn!(error = %e, "runtime event error"),
            }
        }
        tracing::warn!("runtime event stream ended; no further containers will be attached");
    }

    /// Begins reading a container's output. Already attached containers are
    /// left alone, so at most one reader exists per container.
    pub async fn attach(&self, id: &str) -> Result<Container> {
        if let Some(existing) = self.get(id) {
            return Ok(existing);
        }
        let container = self.runtime.inspect(id).await?;
        let stream = self.runtime.attach(&container.id).await?;
        Ok(self.register(container, stream))
    }

    /// Inserts the container and hands its stream to a reader task.
    fn register(&self, container: Container, stream: ChunkStream) -> Container {
        let short = container.short_id().to_string();
        let fanout = Arc::new(Fanout::new());
        let stop = CancellationToken::new();
        let generation = {
            let mut registry = self.registry();
            if let Some(existing) = registry.attached.get(&short) {
                // lost a race with a concurrent attach; its reader wins
                return existing.container.clone();
            }
            registry.prune_listens();
            for listen in registry.listens.iter().filter(|l| l.source.matches(&container)) {
                fanout.subscribe(listen.id, listen.tx.clone(), listen.stop.clone());
            }
            registry.generation += 1;
            let generation = registry.generation;
            registry.attached.insert(
                short.clone(),
                Attached {
                    container: container.clone(),
                    fanout: fanout.clone(),
                    stop: stop.clone(),
                    generation,
                },
            );
            generation
        };
        tracing::info!(
            container_id = %short,
            name = %container.name,
            listeners = fanout.len(),
            "attached"
        );
        tokio::spawn(self.clone().pump(container.clone(), stream, fanout, stop, generation));
        container
    }

    /// Stops the container's reader and releases its listener set.
    pub fn detach(&self, id: &str) -> bool {
        let short = short_id(id);
        let removed = {
            let mut registry = self.registry();
            let removed = registry.attached.remove(short);
            if removed.is_some() {
                registry.release_id_listens(short);
            }
            removed
        };
        match removed {
            Some(attached) => {
                attached.stop.cancel();
                tracing::info!(container_id = %short, name = %attached.container.name, "detached");
                true
            }
            None => false,
        }
    }

    /// Called by a reader whose stream ended on its own; a newer attach of
    /// the same container is left untouched.
    fn release(&self, short: &str, generation: u64) {
        let mut registry = self.registry();
        let current = registry
            .attached
            .get(short)
            .is_some_and(|a| a.generation == generation);
        if current {
            registry.attached.remove(short);
            registry.release_id_listens(short);
        }
    }

    /// Looks up an attached container by full or short id.
    pub fn get(&self, id: &str) -> Option<Container> {
        self.registry()
            .attached
            .get(short_id(id))
            .map(|a| a.container.clone())
    }

    /// Snapshot of attached containers, sorted by name.
    pub fn containers(&self) -> Vec<Container> {
        let mut containers: Vec<Container> = self
            .registry()
            .attached
            .values()
            .map(|a| a.container.clone())
            .collect();
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        containers
    }

    /// Number of live `listen` registrations.
    pub fn listener_count(&self) -> usize {
        let mut registry = self.registry();
        registry.prune_listens();
        registry.listens.len()
    }
}
