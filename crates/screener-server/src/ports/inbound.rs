//! Inbound port: the three operations a JSON-RPC `vulcanizedb_stream`
//! handler drives (§4.5).

use shared_bus::SubscriberId;
use shared_types::entities::BlockPayload;
use shared_types::filters::SubscriptionFilters;
use tokio::sync::mpsc;

/// A live subscriber's two channels: decoded frames (live and, if
/// `historical_range` was set, historical replay first) and best-effort
/// error notices (e.g. "your channel overflowed, a block was dropped").
pub struct SubscriptionHandle {
    pub id: SubscriberId,
    pub frames: mpsc::Receiver<BlockPayload>,
    pub errors: mpsc::Receiver<String>,
}

/// Contract: `subscribe`/`unsubscribe` plus the internal `on_block` the
/// pipeline invokes for every indexed block (§4.5).
pub trait ScreenerServerApi: Send + Sync {
    /// Register a subscriber. If `historical_range` is `Some((start, end))`,
    /// a background worker replays `[start, end]` through `cid-retriever` and
    /// the object store before the subscriber starts receiving live blocks
    /// (§4.5: "delivers it on the same channel before switching to live mode").
    fn subscribe(&self, filters: SubscriptionFilters, historical_range: Option<(u64, u64)>) -> SubscriptionHandle;

    fn unsubscribe(&self, id: SubscriberId);

    /// Invoked once per just-processed block. Never blocks (§5: "SRV's
    /// `onBlock` never blocks").
    fn on_block(&self, payload: &BlockPayload);
}
