//! Real upstream adapters: the live `vdb_stream` websocket subscription SC
//! drives, and the archival node's request/response RPC GAP drives (§4.1,
//! §4.6).

use async_trait::async_trait;
use futures::StreamExt;
use jsonrpsee::core::client::{Subscription, SubscriptionClientT};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};

use gap_backfiller::ArchivalSource;
use shared_types::errors::{BackfillError, TransportError};
use shared_types::ipc::UpstreamFrame;
use stream_consumer::ports::outbound::UpstreamSubscription;

/// Live subscription over the primary chain node's `vdb_stream` method.
/// `_client` keeps the websocket connection alive for the subscription's
/// lifetime; it is never called directly once `subscription` exists.
pub struct WsUpstreamSubscription {
    _client: WsClient,
    subscription: Option<Subscription<UpstreamFrame>>,
}

impl WsUpstreamSubscription {
    pub async fn connect(ws_endpoint: &str, starting_block: u64) -> Result<Self, TransportError> {
        let client = WsClientBuilder::default()
            .build(ws_endpoint)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let subscription = client
            .subscribe::<UpstreamFrame, _>("vdb_stream_subscribe", rpc_params![starting_block], "vdb_stream_unsubscribe")
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        Ok(Self { _client: client, subscription: Some(subscription) })
    }
}

#[async_trait]
impl UpstreamSubscription for WsUpstreamSubscription {
    async fn next_frame(&mut self) -> Result<Option<UpstreamFrame>, TransportError> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(None);
        };

        match subscription.next().await {
            None => Ok(None),
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(TransportError::WebSocket(e.to_string())),
        }
    }

    async fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            let _ = subscription.unsubscribe().await;
        }
    }
}

/// Request/response client against the archival node, used by GAP to
/// re-fetch blocks missing from the index (§4.6).
pub struct HttpArchivalSource {
    client: HttpClient,
}

impl HttpArchivalSource {
    pub fn connect(http_endpoint: &str) -> Result<Self, BackfillError> {
        let client = HttpClientBuilder::default()
            .build(http_endpoint)
            .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchivalSource for HttpArchivalSource {
    async fn fetch_block(&self, block_number: u64) -> Result<UpstreamFrame, BackfillError> {
        use jsonrpsee::core::client::ClientT;

        self.client
            .request("vdb_getBlockByNumber", rpc_params![block_number])
            .await
            .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))
    }
}
