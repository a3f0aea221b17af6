//! Route manager: the persisted routing table and one forwarding worker per route.

use crate::attach::{AttachManager, RecordReceiver};
use crate::error::Result;
use crate::forward::{Forwarder, Forwarders};
use crate::models::{new_route_id, Route};
use crate::source::Source;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

mod store;

pub use store::{RouteFileStore, RouteStore};

/// Queue depth between the attach manager and a route worker.
const ROUTE_QUEUE: usize = 1024;

struct RouteEntry {
    route: Route,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RouteTable {
    entries: Vec<RouteEntry>,
    store: Option<Arc<dyn RouteStore>>,
}

impl RouteTable {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.route.id == id)
    }

    async fn persist(&self, routes: &[Route]) -> Result<()> {
        match &self.store {
            Some(store) => store.save(routes).await,
            None => Ok(()),
        }
    }

    /// Inserts or replaces by id, cancelling the worker being replaced.
    fn upsert(&mut self, entry: RouteEntry) {
        match self.position(&entry.route.id) {
            Some(pos) => {
                let old = std::mem::replace(&mut self.entries[pos], entry);
                old.cancel.cancel();
            }
            None => self.entries.push(entry),
        }
    }
}

/// Owns the routing table. Mutations are serialized and persisted before
/// they take effect in memory, so a failed write changes nothing.
pub struct RouteManager {
    attacher: AttachManager,
    forwarders: Arc<Forwarders>,
    table: Mutex<RouteTable>,
}

impl std::fmt::Debug for RouteManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteManager")
            .field("forwarders", &self.forwarders)
            .finish_non_exhaustive()
    }
}

impl RouteManager {
    pub fn new(attacher: AttachManager, forwarders: Forwarders) -> Self {
        Self {
            attacher,
            forwarders: Arc::new(forwarders),
            table: Mutex::new(RouteTable::default()),
        }
    }

    /// Starts every persisted route and keeps `store` for later mutations.
    ///
    /// Persisted routes are taken as they are; one that would fail `add`
    /// validation still loads and is written back on the next save.
    #[instrument(skip(self, store))]
    pub async fn load(&self, store: Arc<dyn RouteStore>) -> Result<usize> {
        let routes = store.load().await?;
        let mut table = self.table.lock().await;
        let mut loaded = 0;
        for mut route in routes {
            if let Err(e) = route.validate() {
                tracing::warn!(route_id = %route.id, error = %e, "persisted route is incomplete");
            }
            if route.id.is_empty() {
                route.id = new_route_id();
            }
            let cancel = self.spawn_worker(route.clone());
            table.upsert(RouteEntry { route, cancel });
            loaded += 1;
        }
        table.store = Some(store);
        tracing::info!(loaded, "routes loaded");
        Ok(loaded)
    }

    /// Validates, assigns an id when missing, persists, then starts the worker.
    /// An existing route with the same id is replaced.
    #[instrument(skip(self, route), fields(route_id = %route.id))]
    pub async fn add(&self, mut route: Route) -> Result<Route> {
        route.validate()?;
        if route.id.is_empty() {
            route.id = new_route_id();
        }

        let mut table = self.table.lock().await;
        let mut candidate: Vec<Route> = table.entries.iter().map(|e| e.route.clone()).collect();
        match candidate.iter_mut().find(|r| r.id == route.id) {
            Some(slot) => *slot = route.clone(),
            None => candidate.push(route.clone()),
        }
        table.persist(&candidate).await?;

        let cancel = self.spawn_worker(route.clone());
        table.upsert(RouteEntry {
            route: route.clone(),
            cancel,
        });
        tracing::info!(
            route_id = %route.id,
            target_type = %route.target.kind,
            addr = %route.target.addr,
            "route added"
        );
        Ok(route)
    }

    /// Routes in insertion order.
    pub async fn get_all(&self) -> Vec<Route> {
        let table = self.table.lock().await;
        table.entries.iter().map(|e| e.route.clone()).collect()
    }

    pub async fn get(&self, id: &str) -> Option<Route> {
        let table = self.table.lock().await;
        table.position(id).map(|pos| table.entries[pos].route.clone())
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stops and deletes a route; `false` when the id is unknown.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut table = self.table.lock().await;
        let Some(pos) = table.position(id) else {
            return Ok(false);
        };
        let candidate: Vec<Route> = table
            .entries
            .iter()
            .filter(|e| e.route.id != id)
            .map(|e| e.route.clone())
            .collect();
        table.persist(&candidate).await?;

        let entry = table.entries.remove(pos);
        entry.cancel.cancel();
        tracing::info!(route_id = %id, "route removed");
        Ok(true)
    }

    fn spawn_worker(&self, route: Route) -> CancellationToken {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(ROUTE_QUEUE);
        self.attacher.listen(Source::All, tx, cancel.clone());
        match self.forwarders.get(&route.target.kind) {
            Some(forwarder) => {
                tokio::spawn(forward_records(route, rx, forwarder, cancel.clone()));
            }
            None => {
                tracing::warn!(
                    route_id = %route.id,
                    target_type = %route.target.kind,
                    "no forwarder for target type, route is inert"
                );
                tokio::spawn(discard_records(rx, cancel.clone()));
            }
        }
        cancel
    }
}

impl Drop for RouteManager {
    fn drop(&mut self) {
        for entry in &self.table.get_mut().entries {
            entry.cancel.cancel();
        }
    }
}

/// Keeps an inert route's listener registered until the route goes away.
async fn discard_records(mut rx: RecordReceiver, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            record = rx.recv() => if record.is_none() { break },
        }
    }
}

async fn forward_records(
    route: Route,
    mut rx: RecordReceiver,
    forwarder: Arc<dyn Forwarder>,
    cancel: CancellationToken,
) {
    let mut failing = false;
    loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            record = rx.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };
        if !route.accepts(&record.stream) {
            continue;
        }
        match forwarder.forward(&route.target, &record).await {
            Ok(()) => {
                if failing {
                    tracing::info!(route_id = %route.id, "forwarding recovered");
                    failing = false;
                }
            }
            Err(e) if failing => {
                tracing::debug!(route_id = %route.id, error = %e, "forward failed");
            }
            Err(e) => {
                tracing::warn!(
                    route_id = %route.id,
                    addr = %route.target.addr,
                    error = %e,
                    "forward failed"
                );
                failing = true;
            }
        }
    }
    tracing::debug!(route_id = %route.id, "route worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogRecord, Target};
    use crate::runtime::{LogChunk, MemoryRuntime};
    use crate::SpoutError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const WEB_ID: &str = "cccccccccccc000000000001";

    /// Hands every forwarded record to the test; records whose data is
    /// `fail` are rejected.
    struct RecordingForwarder {
        tx: mpsc::UnboundedSender<(String, String)>,
    }

    #[async_trait]
    impl Forwarder for RecordingForwarder {
        async fn forward(&self, target: &Target, record: &LogRecord) -> Result<()> {
            if record.data == "fail" {
                return Err(SpoutError::Other("rejected".into()));
            }
            let _ = self.tx.send((target.addr.clone(), record.data.clone()));
            Ok(())
        }
    }

    struct FailingStore {
        fail: AtomicBool,
        saved: std::sync::Mutex<Vec<Route>>,
    }

    #[async_trait]
    impl RouteStore for FailingStore {
        async fn load(&self) -> Result<Vec<Route>> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save(&self, routes: &[Route]) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SpoutError::Store("disk full".into()));
            }
            *self.saved.lock().unwrap() = routes.to_vec();
            Ok(())
        }
    }

    fn setup() -> (
        Arc<MemoryRuntime>,
        RouteManager,
        mpsc::UnboundedReceiver<(String, String)>,
    ) {
        let runtime = Arc::new(MemoryRuntime::new());
        let attacher = AttachManager::new(runtime.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let mut forwarders = Forwarders::new();
        forwarders.register("test", Arc::new(RecordingForwarder { tx }));
        (runtime, RouteManager::new(attacher, forwarders), rx)
    }

    fn route(addr: &str) -> Route {
        Route::new(Target::new("test", addr))
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<(String, String)>) -> (String, String) {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn add_assigns_id_and_lists_in_order() {
        let (_runtime, manager, _rx) = setup();
        let first = manager.add(route("a:1")).await.unwrap();
        let second = manager.add(route("b:2").with_id("fixed")).await.unwrap();

        assert_eq!(first.id.len(), 12);
        assert!(first.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(second.id, "fixed");
        assert_eq!(manager.get_all().await, vec![first.clone(), second]);
        assert_eq!(manager.get(&first.id).await, Some(first));
        assert_eq!(manager.get("missing").await, None);
    }

    #[tokio::test]
    async fn add_rejects_incomplete_target() {
        let (_runtime, manager, _rx) = setup();
        let err = manager.add(route("")).await.unwrap_err();
        assert!(matches!(err, SpoutError::InvalidRoute(_)));
        let err = manager
            .add(Route::new(Target::new("", "h:1")))
            .await
            .unwrap_err();
        assert!(matches!(err, SpoutError::InvalidRoute(_)));
        assert!(manager.is_empty().await);
    }

    #[tokio::test]
    async fn add_with_existing_id_replaces() {
        let (_runtime, manager, _rx) = setup();
        manager.add(route("old:1").with_id("r")).await.unwrap();
        manager.add(route("new:1").with_id("r")).await.unwrap();
        let routes = manager.get_all().await;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].target.addr, "new:1");
    }

    #[tokio::test]
    async fn table_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let (_runtime, manager, _rx) = setup();
        assert_eq!(
            manager
                .load(Arc::new(RouteFileStore::new(dir.path())))
                .await
                .unwrap(),
            0
        );
        let kept = manager
            .add(route("a:1").with_types(["stderr"]))
            .await
            .unwrap();
        let dropped = manager.add(route("b:2")).await.unwrap();
        assert!(manager.remove(&dropped.id).await.unwrap());
        assert!(!manager.remove(&dropped.id).await.unwrap());

        let (_runtime, reloaded, _rx) = setup();
        let count = reloaded
            .load(Arc::new(RouteFileStore::new(dir.path())))
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(reloaded.get_all().await, vec![kept]);
    }

    #[tokio::test]
    async fn failed_persist_changes_nothing() {
        let (_runtime, manager, _rx) = setup();
        let store = Arc::new(FailingStore {
            fail: AtomicBool::new(false),
            saved: std::sync::Mutex::new(Vec::new()),
        });
        manager.load(store.clone()).await.unwrap();
        let existing = manager.add(route("a:1")).await.unwrap();

        store.fail.store(true, Ordering::SeqCst);
        let err = manager.add(route("b:2")).await.unwrap_err();
        assert!(matches!(err, SpoutError::Store(_)));
        assert!(manager.remove(&existing.id).await.is_err());

        assert_eq!(manager.get_all().await, vec![existing.clone()]);
        assert_eq!(*store.saved.lock().unwrap(), vec![existing]);
    }

    #[tokio::test]
    async fn types_filter_what_is_forwarded() {
        let (runtime, manager, mut rx) = setup();
        runtime.start_container(WEB_ID, "web");
        manager.attacher.attach(WEB_ID).await.unwrap();

        manager
            .add(route("only-stdout").with_types(["stdout"]))
            .await
            .unwrap();
        runtime.emit(WEB_ID, LogChunk::stderr("err\n"));
        runtime.emit(WEB_ID, LogChunk::stdout("out\n"));
        assert_eq!(next(&mut rx).await, ("only-stdout".into(), "out".into()));

        manager.add(route("everything")).await.unwrap();
        runtime.emit(WEB_ID, LogChunk::stderr("err2\n"));
        assert_eq!(next(&mut rx).await, ("everything".into(), "err2".into()));
    }

    #[tokio::test]
    async fn forward_errors_do_not_stop_the_worker() {
        let (runtime, manager, mut rx) = setup();
        runtime.start_container(WEB_ID, "web");
        manager.attacher.attach(WEB_ID).await.unwrap();
        manager.add(route("sink")).await.unwrap();

        runtime.emit(WEB_ID, LogChunk::stdout("fail\nfail\nok\n"));
        assert_eq!(next(&mut rx).await.1, "ok");
    }

    #[tokio::test]
    async fn removed_route_stops_forwarding() {
        let (runtime, manager, mut rx) = setup();
        runtime.start_container(WEB_ID, "web");
        manager.attacher.attach(WEB_ID).await.unwrap();
        let r = manager.add(route("sink")).await.unwrap();
        runtime.emit(WEB_ID, LogChunk::stdout("one\n"));
        assert_eq!(next(&mut rx).await.1, "one");

        assert!(manager.remove(&r.id).await.unwrap());
        runtime.emit(WEB_ID, LogChunk::stdout("two\n"));
        let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn unknown_target_type_is_inert_but_keeps_its_listener() {
        let (runtime, manager, mut rx) = setup();
        runtime.start_container(WEB_ID, "web");
        manager.attacher.attach(WEB_ID).await.unwrap();
        let added = manager
            .add(Route::new(Target::new("kafka", "k:9092")))
            .await
            .unwrap();
        assert_eq!(manager.get(&added.id).await, Some(added.clone()));

        runtime.emit(WEB_ID, LogChunk::stdout("dropped\n"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.attacher.listener_count(), 1);
        assert!(rx.try_recv().is_err());

        assert!(manager.remove(&added.id).await.unwrap());
        for _ in 0..200 {
            if manager.attacher.listener_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("inert route listener still registered");
    }

    #[tokio::test]
    async fn incomplete_persisted_route_survives_later_saves() {
        let (_runtime, manager, _rx) = setup();
        let incomplete = route("").with_id("keep");
        let store = Arc::new(FailingStore {
            fail: AtomicBool::new(false),
            saved: std::sync::Mutex::new(vec![incomplete.clone()]),
        });
        assert_eq!(manager.load(store.clone()).await.unwrap(), 1);
        assert_eq!(manager.get("keep").await, Some(incomplete.clone()));

        let added = manager.add(route("h:1")).await.unwrap();
        assert_eq!(*store.saved.lock().unwrap(), vec![incomplete, added]);
    }
}
