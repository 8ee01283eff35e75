//! Inbound port: the API `node-runtime` drives to run the backfill loop.

use async_trait::async_trait;
use shared_bus::QuitWatch;
use shared_types::errors::BackfillError;

/// Contract: periodic tick (`frequency`, default 5 minutes) driving the
/// gap-detection-then-backfill cycle until `quit` fires (§4.6).
#[async_trait]
pub trait GapBackfillerApi: Send {
    async fn run(&mut self, quit: QuitWatch) -> Result<(), BackfillError>;
}
