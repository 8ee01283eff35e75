//! Tick-driven gap detection and backfill (§4.6). Reuses `stream-consumer`'s
//! decode logic against a second, archival upstream rather than
//! re-implementing frame decoding.

use async_trait::async_trait;
use shared_bus::QuitWatch;
use shared_types::errors::BackfillError;
use std::sync::Arc;
use std::time::Duration;
use stream_consumer::domain::decode_frame;
use stream_consumer::ports::outbound::ChainCodec;

use cid_retriever::CidRetrieverApi;
use content_publisher::ContentPublisherApi;
use index_repository::IndexRepositoryApi;

use crate::domain::block_numbers_in_range;
use crate::ports::inbound::GapBackfillerApi;
use crate::ports::outbound::ArchivalSource;

pub struct GapBackfiller<A, R, C, I>
where
    A: ArchivalSource,
    R: CidRetrieverApi,
    C: ContentPublisherApi,
    I: IndexRepositoryApi,
{
    archival: A,
    retriever: Arc<R>,
    publisher: Arc<C>,
    indexer: Arc<I>,
    codec: Arc<dyn ChainCodec>,
    frequency: Duration,
}

impl<A, R, C, I> GapBackfiller<A, R, C, I>
where
    A: ArchivalSource,
    R: CidRetrieverApi,
    C: ContentPublisherApi,
    I: IndexRepositoryApi,
{
    pub fn new(
        archival: A,
        retriever: Arc<R>,
        publisher: Arc<C>,
        indexer: Arc<I>,
        codec: Arc<dyn ChainCodec>,
        frequency: Duration,
    ) -> Self {
        Self {
            archival,
            retriever,
            publisher,
            indexer,
            codec,
            frequency,
        }
    }

    async fn backfill_tick(&self) -> Result<(), BackfillError> {
        let gaps = self.retriever.gaps_in_data().await?;
        if gaps.is_empty() {
            return Ok(());
        }
        telemetry::GAPS_DETECTED.inc_by(gaps.len() as f64);

        for (start, stop) in gaps {
            for block_number in block_numbers_in_range(start, stop) {
                let frame = self.archival.fetch_block(block_number).await?;
                let payload = match decode_frame(frame, self.codec.as_ref()) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::error!(stage = "gap-backfiller", block_number, %err, "dropping malformed archival frame");
                        continue;
                    }
                };

                let published = self.publisher.publish(&payload).await?;
                self.indexer.index(&published, &payload).await?;
                telemetry::GAPS_BACKFILLED.inc();
                tracing::debug!(stage = "gap-backfiller", block_number, "backfilled gap block");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<A, R, C, I> GapBackfillerApi for GapBackfiller<A, R, C, I>
where
    A: ArchivalSource,
    R: CidRetrieverApi,
    C: ContentPublisherApi,
    I: IndexRepositoryApi,
{
    async fn run(&mut self, mut quit: QuitWatch) -> Result<(), BackfillError> {
        let mut ticker = tokio::time::interval(self.frequency);
        ticker.tick().await; // first tick fires immediately; consume it here

        loop {
            tokio::select! {
                biased;

                _ = quit.wait() => {
                    return Ok(());
                }

                _ = ticker.tick() => {
                    self.backfill_tick().await?;
                }
            }
        }
    }
}
