//! Generic non-blocking fan-out registry.
//!
//! `screener-server` builds its subscriber table on top of this: it stores
//! the per-subscriber predicate set itself (§3: "SRV exclusively owns the
//! Subscription table"), and delegates the actual delivery channel plus the
//! non-blocking offer policy (§4.5) to [`FanoutRegistry`]. The single mutex
//! guarding the map is the one required by §5 ("mutated by
//! subscribe/unsubscribe and read by `onBlock`... MUST be serialized under a
//! single mutex").

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifies one live subscriber's delivery channel.
pub type SubscriberId = Uuid;

struct FanoutChannel<T> {
    tx: mpsc::Sender<T>,
    err_tx: mpsc::Sender<String>,
}

/// A registry of bounded, non-blocking delivery channels keyed by
/// [`SubscriberId`].
pub struct FanoutRegistry<T> {
    channels: Mutex<HashMap<SubscriberId, FanoutChannel<T>>>,
}

impl<T> Default for FanoutRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FanoutRegistry<T> {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new subscriber with the given channel capacities. Returns
    /// its id and the two receivers: items, and overflow/error notices.
    pub fn register(
        &self,
        capacity: usize,
        err_capacity: usize,
    ) -> (SubscriberId, mpsc::Receiver<T>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (err_tx, err_rx) = mpsc::channel(err_capacity);
        let id = Uuid::new_v4();
        self.channels
            .lock()
            .unwrap()
            .insert(id, FanoutChannel { tx, err_tx });
        (id, rx, err_rx)
    }

    /// Drop a subscriber's channels. Safe to call more than once.
    pub fn unregister(&self, id: SubscriberId) {
        self.channels.lock().unwrap().remove(&id);
    }

    /// Snapshot of currently-registered subscriber ids.
    pub fn ids(&self) -> Vec<SubscriberId> {
        self.channels.lock().unwrap().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + 'static> FanoutRegistry<T> {
    /// Offer `item` to `id` without blocking. If the subscriber's channel is
    /// full, the item is dropped for that subscriber and `message` is
    /// reported on its error channel (best-effort; a full error channel is
    /// itself just dropped) — slow subscribers never slow the pipeline (§4.5).
    pub fn offer(&self, id: SubscriberId, item: T, overflow_message: impl FnOnce() -> String) -> bool {
        let tx = {
            let channels = self.channels.lock().unwrap();
            match channels.get(&id) {
                Some(ch) => ch.tx.clone(),
                None => return false,
            }
        };

        match tx.try_send(item) {
            Ok(()) => true,
            Err(_) => {
                if let Some(err_tx) = self.channels.lock().unwrap().get(&id).map(|c| c.err_tx.clone()) {
                    let _ = err_tx.try_send(overflow_message());
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_registered_subscriber() {
        let registry: FanoutRegistry<u64> = FanoutRegistry::new();
        let (id, mut rx, _err_rx) = registry.register(4, 4);

        assert!(registry.offer(id, 42, || "overflow".into()));
        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test]
    async fn full_channel_reports_error_and_does_not_block() {
        let registry: FanoutRegistry<u64> = FanoutRegistry::new();
        let (id, _rx, mut err_rx) = registry.register(1, 4);

        assert!(registry.offer(id, 1, || "first".into()));
        assert!(!registry.offer(id, 2, || "dropped block 2".into()));

        assert_eq!(err_rx.recv().await, Some("dropped block 2".into()));
    }

    #[tokio::test]
    async fn unregister_removes_subscriber() {
        let registry: FanoutRegistry<u64> = FanoutRegistry::new();
        let (id, _rx, _err_rx) = registry.register(4, 4);
        assert_eq!(registry.len(), 1);

        registry.unregister(id);
        assert_eq!(registry.len(), 0);
        assert!(!registry.offer(id, 1, || "unused".into()));
    }

    #[tokio::test]
    async fn one_slow_subscriber_does_not_affect_another() {
        let registry: FanoutRegistry<u64> = FanoutRegistry::new();
        let (slow_id, _slow_rx, mut slow_err) = registry.register(1, 4);
        let (fast_id, mut fast_rx, _fast_err) = registry.register(1000, 4);

        registry.offer(slow_id, 0, || "warm".into());
        for block in 1..=1000u64 {
            registry.offer(slow_id, block, || format!("dropped {block}"));
            registry.offer(fast_id, block, || format!("dropped {block}"));
        }

        assert!(slow_err.recv().await.is_some());
        let mut received = 0;
        while fast_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 1000);
    }
}
