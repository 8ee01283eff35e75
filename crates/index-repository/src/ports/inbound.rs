//! Inbound port: the API `node-runtime` drives to index one block.

use async_trait::async_trait;
use shared_types::cid::PublishedCids;
use shared_types::entities::BlockPayload;
use shared_types::errors::IndexError;

/// Contract: `index(pub, payload) -> err | nil` (§4.3). Runs the whole
/// five-step upsert sequence in a single transaction; any step failing
/// rolls back the lot.
#[async_trait]
pub trait IndexRepositoryApi: Send + Sync {
    async fn index(&self, published: &PublishedCids, payload: &BlockPayload) -> Result<(), IndexError>;
}
