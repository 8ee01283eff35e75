//! Inbound port: the API `node-runtime` drives to publish one block.

use async_trait::async_trait;
use shared_types::cid::PublishedCids;
use shared_types::entities::BlockPayload;
use shared_types::errors::PublishError;

/// Contract: `publish(payload) -> PublishedCids | err` (§4.2). A failure
/// anywhere in the block leaves none of its components durably stored.
#[async_trait]
pub trait ContentPublisherApi: Send + Sync {
    async fn publish(&self, payload: &BlockPayload) -> Result<PublishedCids, PublishError>;
}
