//! Inbound port: the API `node-runtime` drives to run one consumer loop.

use async_trait::async_trait;
use shared_bus::QuitWatch;
use shared_types::{BlockPayload, TransportError};
use tokio::sync::mpsc;

/// Contract: `start(out, quit) -> err | nil` (§4.1).
#[async_trait]
pub trait StreamConsumerApi: Send {
    /// Run until `quit` fires or the upstream subscription ends. Blocks on
    /// `out.send` when the channel is full; returns `Ok(())` on a clean
    /// shutdown or upstream channel closure, `Err` on a fatal transport
    /// failure.
    async fn run(
        &mut self,
        out: mpsc::Sender<BlockPayload>,
        quit: QuitWatch,
    ) -> Result<(), TransportError>;
}
