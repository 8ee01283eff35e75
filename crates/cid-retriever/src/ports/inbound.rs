//! Inbound port: the API `screener-server` (historical replay) and
//! `gap-backfiller` drive.

use async_trait::async_trait;
use shared_types::cid::CidBundle;
use shared_types::errors::BackfillError;
use shared_types::filters::SubscriptionFilters;

/// Contract: `retrieve(predicates, blockNumber) -> CidBundle` (§4.4). One
/// read transaction, one query per enabled category.
#[async_trait]
pub trait CidRetrieverApi: Send + Sync {
    async fn retrieve(
        &self,
        filters: &SubscriptionFilters,
        block_number: u64,
    ) -> Result<CidBundle, BackfillError>;

    async fn first_block_number(&self) -> Result<Option<u64>, BackfillError>;
    async fn last_block_number(&self) -> Result<Option<u64>, BackfillError>;
    async fn gaps_in_data(&self) -> Result<Vec<(u64, u64)>, BackfillError>;
}
