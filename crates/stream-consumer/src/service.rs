//! The consumer loop: decode-and-emit, with quit as a priority select (§5).

use async_trait::async_trait;
use shared_bus::QuitWatch;
use shared_types::{BlockPayload, TransportError};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::{decode_frame, StreamConfig};
use crate::ports::inbound::StreamConsumerApi;
use crate::ports::outbound::{ChainCodec, UpstreamSubscription};

pub struct StreamConsumer<U: UpstreamSubscription> {
    upstream: U,
    codec: Arc<dyn ChainCodec>,
    config: StreamConfig,
}

impl<U: UpstreamSubscription> StreamConsumer<U> {
    pub fn new(upstream: U, codec: Arc<dyn ChainCodec>, config: StreamConfig) -> Self {
        Self {
            upstream,
            codec,
            config,
        }
    }

    pub fn outbound_capacity(&self) -> usize {
        self.config.outbound_capacity
    }
}

#[async_trait]
impl<U: UpstreamSubscription> StreamConsumerApi for StreamConsumer<U> {
    async fn run(
        &mut self,
        out: mpsc::Sender<BlockPayload>,
        mut quit: QuitWatch,
    ) -> Result<(), TransportError> {
        loop {
            tokio::select! {
                biased;

                _ = quit.wait() => {
                    self.upstream.unsubscribe().await;
                    return Ok(());
                }

                frame = self.upstream.next_frame() => {
                    match frame? {
                        None => {
                            // Upstream error channel closed: non-error terminal (§4.1).
                            return Ok(());
                        }
                        Some(frame) => {
                            let block_number = frame.block_number;
                            match decode_frame(frame, self.codec.as_ref()) {
                                Ok(payload) => {
                                    telemetry::BLOCKS_SYNCED.inc();
                                    if out.send(payload).await.is_err() {
                                        // Downstream stage gone; nothing left to feed.
                                        return Ok(());
                                    }
                                }
                                Err(err) => {
                                    telemetry::SC_DECODE_ERRORS.inc();
                                    tracing::error!(stage = "stream-consumer", block_number, %err, "dropping malformed frame");
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::fakes::{FakeCodec, FakeUpstream};
    use shared_types::ipc::UpstreamFrame;
    use std::collections::BTreeMap;

    fn frame(block_number: u64) -> UpstreamFrame {
        UpstreamFrame {
            block_number,
            headers_rlp: vec![block_number as u8],
            uncles_rlp: vec![],
            transactions_rlp: vec![],
            receipts_rlp: vec![],
            state_nodes_rlp: BTreeMap::new(),
            storage_nodes_rlp: BTreeMap::new(),
            err_msg: String::new(),
        }
    }

    #[tokio::test]
    async fn emits_decoded_payloads_then_stops_on_upstream_close() {
        let upstream = FakeUpstream::new(vec![frame(1), frame(2)]);
        let mut consumer = StreamConsumer::new(upstream, Arc::new(FakeCodec), StreamConfig::default());

        let (tx, mut rx) = mpsc::channel(10);
        let (_signal, watch) = shared_bus::QuitSignal::new();

        consumer.run(tx, watch).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.block_number, 1);
        assert_eq!(second.block_number, 2);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn quit_stops_the_loop_and_unsubscribes() {
        let upstream = FakeUpstream::new(vec![]);
        let (signal, watch) = shared_bus::QuitSignal::new();
        signal.trigger();

        let mut consumer = StreamConsumer::new(upstream, Arc::new(FakeCodec), StreamConfig::default());
        let (tx, _rx) = mpsc::channel(1);

        consumer.run(tx, watch).await.unwrap();
        assert!(consumer.upstream.unsubscribed);
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_not_fatal() {
        let mut bad = frame(5);
        bad.err_msg = "node crashed".into();
        let upstream = FakeUpstream::new(vec![bad, frame(6)]);
        let mut consumer = StreamConsumer::new(upstream, Arc::new(FakeCodec), StreamConfig::default());

        let (tx, mut rx) = mpsc::channel(10);
        let (_signal, watch) = shared_bus::QuitSignal::new();

        consumer.run(tx, watch).await.unwrap();

        let only = rx.recv().await.unwrap();
        assert_eq!(only.block_number, 6);
        assert!(rx.recv().await.is_none());
    }
}
