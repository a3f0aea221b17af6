//! Bounded multicast: one producer, any number of consumers joining and leaving.
//!
//! Delivery never waits. A consumer whose queue is full misses that item and
//! nobody else notices; a consumer whose queue is closed or whose token is
//! cancelled is dropped on the next publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Subscriber<T> {
    id: u64,
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

#[derive(Debug)]
pub struct Fanout<T> {
    subscribers: Mutex<Vec<Subscriber<T>>>,
    dropped: AtomicU64,
}

impl<T> Default for Fanout<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }
}

impl<T: Clone> Fanout<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber<T>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a consumer under `id`. Several consumers may share one queue.
    pub fn subscribe(&self, id: u64, tx: mpsc::Sender<T>, cancel: CancellationToken) {
        self.lock().push(Subscriber { id, tx, cancel });
    }

    /// Removes the consumer registered under `id`; false if there was none.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Offers `item` to every live consumer and returns how many accepted it.
    pub fn publish(&self, item: T) -> usize {
        let mut delivered = 0;
        let mut subscribers = self.lock();
        subscribers.retain(|s| {
            if s.cancel.is_cancelled() {
                return false;
            }
            match s.tx.try_send(item.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Items discarded because a consumer's queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_order_to_every_subscriber() {
        let fanout = Fanout::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        fanout.subscribe(1, tx1, CancellationToken::new());
        fanout.subscribe(2, tx2, CancellationToken::new());

        for i in 0..3 {
            assert_eq!(fanout.publish(i), 2);
        }
        for i in 0..3 {
            assert_eq!(rx1.recv().await, Some(i));
            assert_eq!(rx2.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn full_queue_drops_only_for_that_subscriber() {
        let fanout = Fanout::new();
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        fanout.subscribe(1, slow_tx, CancellationToken::new());
        fanout.subscribe(2, fast_tx, CancellationToken::new());

        assert_eq!(fanout.publish("a"), 2);
        assert_eq!(fanout.publish("b"), 1);
        assert_eq!(fanout.dropped(), 1);
        assert_eq!(fanout.len(), 2);

        assert_eq!(slow_rx.recv().await, Some("a"));
        assert_eq!(fast_rx.recv().await, Some("a"));
        assert_eq!(fast_rx.recv().await, Some("b"));

        // the slow consumer keeps receiving once it has room again
        assert_eq!(fanout.publish("c"), 2);
        assert_eq!(slow_rx.recv().await, Some("c"));
    }

    #[tokio::test]
    async fn cancelled_and_closed_subscribers_are_pruned() {
        let fanout = Fanout::new();
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, rx2) = mpsc::channel(8);
        let (tx3, mut rx3) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        fanout.subscribe(1, tx1, cancel.clone());
        fanout.subscribe(2, tx2, CancellationToken::new());
        fanout.subscribe(3, tx3, CancellationToken::new());

        cancel.cancel();
        drop(rx2);
        assert_eq!(fanout.publish(7u32), 1);
        assert_eq!(fanout.len(), 1);
        assert_eq!(rx3.recv().await, Some(7));
    }

    #[tokio::test]
    async fn shared_queue_and_unsubscribe() {
        let fanout = Fanout::new();
        let (tx, mut rx) = mpsc::channel(8);
        fanout.subscribe(1, tx.clone(), CancellationToken::new());
        fanout.subscribe(2, tx, CancellationToken::new());

        assert_eq!(fanout.publish(1u8), 2);
        assert!(fanout.unsubscribe(1));
        assert!(!fanout.unsubscribe(1));
        assert_eq!(fanout.publish(2u8), 1);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let fanout: Fanout<u8> = Fanout::new();
        assert!(fanout.is_empty());
        assert_eq!(fanout.publish(1), 0);
        assert_eq!(fanout.dropped(), 0);
    }
}
