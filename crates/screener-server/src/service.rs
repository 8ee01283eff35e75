//! Subscriber registry, live fan-out, and historical replay (§4.5, §5).
//!
//! SRV owns the subscriber table itself — a map from [`SubscriberId`] to the
//! predicates that subscriber asked for — and delegates channel plumbing and
//! the non-blocking delivery policy to [`shared_bus::FanoutRegistry`]. Both
//! are guarded by their own mutex, matching §5's "serialized under a single
//! mutex" for each independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{error, warn};

use shared_bus::{FanoutRegistry, SubscriberId};
use shared_types::entities::BlockPayload;
use shared_types::filters::SubscriptionFilters;

use cid_retriever::ports::inbound::CidRetrieverApi;
use content_publisher::ObjectStore;

use crate::domain::{filter_payload, payload_from_resolved};
use crate::ports::inbound::{ScreenerServerApi, SubscriptionHandle};

const FRAME_CAPACITY: usize = 64;
const ERROR_CAPACITY: usize = 16;

/// `Screener<R, O>` is generic over the retriever and object store so tests
/// can swap in fakes, the same pattern `gap-backfiller::GapBackfiller` uses.
pub struct Screener<R: CidRetrieverApi, O: ObjectStore> {
    registry: Arc<FanoutRegistry<BlockPayload>>,
    subscribers: Mutex<HashMap<SubscriberId, SubscriptionFilters>>,
    retriever: Arc<R>,
    object_store: Arc<O>,
}

impl<R: CidRetrieverApi + 'static, O: ObjectStore + 'static> Screener<R, O> {
    pub fn new(retriever: Arc<R>, object_store: Arc<O>) -> Self {
        Self {
            registry: Arc::new(FanoutRegistry::new()),
            subscribers: Mutex::new(HashMap::new()),
            retriever,
            object_store,
        }
    }

    /// Resolves every CID in `bundle` to bytes and reassembles a
    /// [`BlockPayload`]. A single failed GET aborts the whole block: object
    /// store failures are non-fatal to the pipeline, but this block's replay
    /// cannot be completed, so it is skipped rather than delivered partially.
    async fn resolve_bundle(&self, bundle: &shared_types::cid::CidBundle) -> Option<BlockPayload> {
        let header_bytes = match bundle.headers.first() {
            Some(cid) => match self.object_store.get(cid).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(block_number = bundle.block_number, error = %e, "failed to resolve header cid during replay");
                    return None;
                }
            },
            None => Vec::new(),
        };

        let mut uncle_bytes = Vec::with_capacity(bundle.uncles.len());
        for u in &bundle.uncles {
            match self.object_store.get(&u.cid).await {
                Ok(bytes) => uncle_bytes.push(bytes),
                Err(e) => {
                    error!(block_number = bundle.block_number, error = %e, "failed to resolve uncle cid during replay");
                    return None;
                }
            }
        }

        let mut transaction_bytes = Vec::with_capacity(bundle.transactions.len());
        for t in &bundle.transactions {
            match self.object_store.get(&t.cid).await {
                Ok(bytes) => transaction_bytes.push(bytes),
                Err(e) => {
                    error!(block_number = bundle.block_number, error = %e, "failed to resolve transaction cid during replay");
                    return None;
                }
            }
        }

        let mut receipt_bytes = Vec::with_capacity(bundle.receipts.len());
        for r in &bundle.receipts {
            match self.object_store.get(&r.cid).await {
                Ok(bytes) => receipt_bytes.push(bytes),
                Err(e) => {
                    error!(block_number = bundle.block_number, error = %e, "failed to resolve receipt cid during replay");
                    return None;
                }
            }
        }

        let mut state_bytes = Vec::with_capacity(bundle.state_nodes.len());
        for s in &bundle.state_nodes {
            match self.object_store.get(&s.cid).await {
                Ok(bytes) => state_bytes.push(bytes),
                Err(e) => {
                    error!(block_number = bundle.block_number, error = %e, "failed to resolve state node cid during replay");
                    return None;
                }
            }
        }

        let mut storage_bytes = Vec::with_capacity(bundle.storage_nodes.len());
        for s in &bundle.storage_nodes {
            match self.object_store.get(&s.cid).await {
                Ok(bytes) => storage_bytes.push(bytes),
                Err(e) => {
                    error!(block_number = bundle.block_number, error = %e, "failed to resolve storage node cid during replay");
                    return None;
                }
            }
        }

        Some(payload_from_resolved(
            bundle,
            header_bytes,
            uncle_bytes,
            transaction_bytes,
            receipt_bytes,
            state_bytes,
            storage_bytes,
        ))
    }

    /// Replays `[start, end]` onto `id`'s channel in order, then returns so
    /// live delivery via [`ScreenerServerApi::on_block`] can take over.
    async fn replay(&self, id: SubscriberId, filters: SubscriptionFilters, start: u64, end: u64) {
        for block_number in start..=end {
            let bundle = match self.retriever.retrieve(&filters, block_number).await {
                Ok(bundle) => bundle,
                Err(e) => {
                    warn!(block_number, error = %e, "skipping block during historical replay");
                    continue;
                }
            };

            let Some(payload) = self.resolve_bundle(&bundle).await else {
                continue;
            };

            if !self.registry.offer(id, payload, || format!("historical block {block_number} dropped")) {
                telemetry::SRV_DROPPED_DELIVERIES.with_label_values(&["historical"]).inc();
            }
        }
    }
}

impl<R: CidRetrieverApi + 'static, O: ObjectStore + 'static> ScreenerServerApi for Screener<R, O> {
    fn subscribe(&self, filters: SubscriptionFilters, historical_range: Option<(u64, u64)>) -> SubscriptionHandle {
        let (id, frames, errors) = self.registry.register(FRAME_CAPACITY, ERROR_CAPACITY);
        self.subscribers.lock().unwrap().insert(id, filters.clone());
        telemetry::ACTIVE_SUBSCRIBERS.inc();

        if let Some((start, end)) = historical_range {
            let registry = Arc::clone(&self.registry);
            let retriever = Arc::clone(&self.retriever);
            let object_store = Arc::clone(&self.object_store);
            tokio::spawn(async move {
                let replayer = Screener {
                    registry,
                    subscribers: Mutex::new(HashMap::new()),
                    retriever,
                    object_store,
                };
                replayer.replay(id, filters, start, end).await;
            });
        }

        SubscriptionHandle { id, frames, errors }
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.registry.unregister(id);
        self.subscribers.lock().unwrap().remove(&id);
        telemetry::ACTIVE_SUBSCRIBERS.dec();
    }

    fn on_block(&self, payload: &BlockPayload) {
        let subscribers = self.subscribers.lock().unwrap().clone();
        for (id, filters) in subscribers {
            let filtered = filter_payload(payload, &filters);
            let block_number = payload.block_number;
            if !self.registry.offer(id, filtered, || format!("block {block_number} dropped for subscriber {id}")) {
                telemetry::SRV_DROPPED_DELIVERIES.with_label_values(&["live"]).inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use content_publisher::InMemoryObjectStore;
    use shared_types::cid::{Cid, CidBundle};
    use shared_types::errors::BackfillError;
    use shared_types::filters::{CategoryFilter, HeaderFields};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct StubRetriever {
        bundle: CidBundle,
        calls: AtomicU64,
    }

    #[async_trait]
    impl CidRetrieverApi for StubRetriever {
        async fn retrieve(&self, _filters: &SubscriptionFilters, block_number: u64) -> Result<CidBundle, BackfillError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut bundle = self.bundle.clone();
            bundle.block_number = block_number;
            Ok(bundle)
        }

        async fn first_block_number(&self) -> Result<Option<u64>, BackfillError> {
            unreachable!("not exercised by these tests")
        }

        async fn last_block_number(&self) -> Result<Option<u64>, BackfillError> {
            unreachable!("not exercised by these tests")
        }

        async fn gaps_in_data(&self) -> Result<Vec<(u64, u64)>, BackfillError> {
            unreachable!("not exercised by these tests")
        }
    }

    async fn store_with_header(bytes: &[u8]) -> (Arc<InMemoryObjectStore>, Cid) {
        let store = Arc::new(InMemoryObjectStore::new());
        let cid = store.put(bytes.to_vec()).await.unwrap();
        (store, cid)
    }

    #[tokio::test]
    async fn on_block_delivers_only_to_matching_filters() {
        let store = Arc::new(InMemoryObjectStore::new());
        let retriever = Arc::new(StubRetriever {
            bundle: CidBundle::default(),
            calls: AtomicU64::new(0),
        });
        let screener = Screener::new(retriever, store);

        let mut wants_header = SubscriptionFilters::none();
        wants_header.header = CategoryFilter::On(HeaderFields { final_only: false });
        let handle_on = screener.subscribe(wants_header, None);
        let handle_off = screener.subscribe(SubscriptionFilters::none(), None);

        let mut payload = BlockPayload::default();
        payload.block_number = 1;
        payload.header_bytes = vec![1, 2, 3];
        screener.on_block(&payload);

        let mut frames_on = handle_on.frames;
        let mut frames_off = handle_off.frames;
        let got = frames_on.try_recv().unwrap();
        assert_eq!(got.header_bytes, vec![1, 2, 3]);
        assert!(frames_off.try_recv().unwrap().header_bytes.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let store = Arc::new(InMemoryObjectStore::new());
        let retriever = Arc::new(StubRetriever {
            bundle: CidBundle::default(),
            calls: AtomicU64::new(0),
        });
        let screener = Screener::new(retriever, store);

        let handle = screener.subscribe(SubscriptionFilters::all(), None);
        screener.unsubscribe(handle.id);

        screener.on_block(&BlockPayload::default());
        assert!(!screener.registry.ids().contains(&handle.id));
    }

    #[tokio::test]
    async fn historical_replay_delivers_in_order_then_live_delivery_still_works() {
        let (store, header_cid) = store_with_header(b"header-bytes").await;
        let mut bundle = CidBundle::default();
        bundle.headers = vec![header_cid];
        let retriever = Arc::new(StubRetriever { bundle, calls: AtomicU64::new(0) });
        let screener = Arc::new(Screener::new(retriever, store));

        let mut filters = SubscriptionFilters::none();
        filters.header = CategoryFilter::On(HeaderFields { final_only: false });
        let handle = screener.subscribe(filters, Some((10, 12)));

        let mut frames = handle.frames;
        let mut seen = Vec::new();
        for _ in 0..3 {
            let payload = frames.recv().await.unwrap();
            seen.push(payload.block_number);
        }
        assert_eq!(seen, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn replay_skips_a_block_whose_cid_cannot_be_resolved() {
        let store = Arc::new(InMemoryObjectStore::new());
        let mut bundle = CidBundle::default();
        bundle.headers = vec![Cid::new("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").unwrap()];
        let retriever = Arc::new(StubRetriever { bundle, calls: AtomicU64::new(0) });
        let screener = Arc::new(Screener::new(retriever, store));

        let mut filters = SubscriptionFilters::none();
        filters.header = CategoryFilter::On(HeaderFields { final_only: false });
        let handle = screener.subscribe(filters, Some((1, 1)));

        let mut frames = handle.frames;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(frames.try_recv().is_err());
    }
}
