use super::*;

impl AttachManager {
    /// Registers a listener for every container `source` matches, now and later.
    ///
    /// Records from all matching containers land in the same queue. The
    /// registration lives until `cancel` fires or the queue's receiver is
    /// dropped; an exact-id listen also ends when its container detaches.
    pub fn listen(&self, source: Source, tx: RecordSender, cancel: CancellationToken) -> u64 {
        let id = self.next_listen.fetch_add(1, Ordering::Relaxed);
        let stop = cancel.child_token();
        let watched = tx.clone();
        let matched = {
            let mut registry = self.registry();
            registry.prune_listens();
            let mut matched = 0;
            for attached in registry
                .attached
                .values()
                .filter(|a| source.matches(&a.container))
            {
                attached.fanout.subscribe(id, tx.clone(), stop.clone());
                matched += 1;
            }
            registry.listens.push(Listen {
                id,
                source: source.clone(),
                tx,
                stop: stop.clone(),
            });
            matched
        };
        tracing::debug!(listen_id = id, ?source, matched, "listener registered");

        let manager = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = watched.closed() => {}
            }
            // the queue must not outlive the registration
            drop(watched);
            manager.unlisten(id);
        });
        id
    }

    fn unlisten(&self, id: u64) {
        let mut registry = self.registry();
        registry.listens.retain(|l| l.id != id);
        for attached in registry.attached.values() {
            attached.fanout.unsubscribe(id);
        }
        tracing::debug!(listen_id = id, "listener released");
    }
}
