//! Drives the five-step upsert sequence inside one transaction (§4.3).

use async_trait::async_trait;
use shared_types::cid::PublishedCids;
use shared_types::entities::BlockPayload;
use shared_types::errors::IndexError;
use std::sync::Arc;

use crate::domain::ensure_aligned;
use crate::ports::inbound::IndexRepositoryApi;
use crate::ports::outbound::IndexStore;

pub struct IndexRepository<S: IndexStore> {
    store: Arc<S>,
    node_id: i64,
}

impl<S: IndexStore> IndexRepository<S> {
    /// `node_id` is the `eth_nodes` row id resolved once at startup via
    /// [`IndexStore::ensure_node`]; every header this repository indexes is
    /// tagged with it.
    pub fn new(store: Arc<S>, node_id: i64) -> Self {
        Self { store, node_id }
    }
}

#[async_trait]
impl<S: IndexStore> IndexRepositoryApi for IndexRepository<S> {
    async fn index(&self, published: &PublishedCids, payload: &BlockPayload) -> Result<(), IndexError> {
        ensure_aligned(payload)?;

        let mut tx = self.store.begin().await?;

        let result = async {
            let header_row_id = tx
                .upsert_header(
                    published.block_number,
                    &published.block_hash,
                    published.header.as_str(),
                    false,
                    self.node_id,
                )
                .await?;

            for uncle in &published.uncles {
                tx.upsert_header(published.block_number, &uncle.hash, uncle.cid.as_str(), true, self.node_id)
                    .await?;
            }

            for (transaction, receipt) in published.transactions.iter().zip(published.receipts.iter()) {
                let tx_row_id = tx
                    .upsert_transaction(
                        header_row_id,
                        &transaction.hash,
                        transaction.cid.as_str(),
                        &transaction.src,
                        &transaction.dst,
                    )
                    .await?;

                let topic0s: Vec<String> = receipt.topic0s.clone();
                tx.upsert_receipt(tx_row_id, receipt.cid.as_str(), &receipt.contract, &topic0s)
                    .await?;
            }

            for state_node in &published.state_nodes {
                let state_row_id = tx
                    .upsert_state_node(header_row_id, &state_node.state_key, state_node.cid.as_str(), state_node.leaf)
                    .await?;

                for storage_node in published
                    .storage_nodes
                    .iter()
                    .filter(|s| s.state_key == state_node.state_key)
                {
                    tx.upsert_storage_node(
                        state_row_id,
                        &storage_node.storage_key,
                        storage_node.cid.as_str(),
                        storage_node.leaf,
                    )
                    .await?;
                }
            }

            Ok::<(), IndexError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                telemetry::BLOCKS_INDEXED.inc();
                tracing::debug!(stage = "index-repository", block_number = published.block_number, "indexed block");
                Ok(())
            }
            Err(err) => {
                telemetry::IDX_TRANSACTION_ROLLBACKS.inc();
                tracing::error!(stage = "index-repository", block_number = published.block_number, %err, "rolling back");
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::FakeIndexStore;
    use shared_types::cid::{Cid, ReceiptCid, TransactionCid, UncleCid};
    use shared_types::entities::{ReceiptEntry, TransactionEntry, UncleEntry};

    // A test CID only needs to satisfy `Cid::new`'s length bound, not be a
    // genuine hash.
    fn fake_cid(tag: &str) -> Cid {
        Cid::new(format!("{:0<64}", tag)).unwrap()
    }

    fn sample() -> (PublishedCids, BlockPayload) {
        let published = PublishedCids {
            block_number: 42,
            block_hash: "0xblock".into(),
            header: fake_cid("header"),
            uncles: vec![UncleCid {
                hash: "0xuncle".into(),
                cid: fake_cid("uncle"),
            }],
            transactions: vec![TransactionCid {
                hash: "0xtx".into(),
                cid: fake_cid("tx"),
                src: "0xsrc".into(),
                dst: "0xdst".into(),
            }],
            receipts: vec![ReceiptCid {
                cid: fake_cid("receipt"),
                contract: "0xcontract".into(),
                topic0s: vec!["0xtopic".into()],
            }],
            state_nodes: vec![],
            storage_nodes: vec![],
        };
        let payload = BlockPayload {
            block_number: 42,
            block_hash: "0xblock".into(),
            header_bytes: vec![1],
            uncles: vec![UncleEntry {
                hash: "0xuncle".into(),
                bytes: vec![2],
            }],
            transactions: vec![TransactionEntry {
                hash: "0xtx".into(),
                bytes: vec![3],
                src: "0xsrc".into(),
                dst: "0xdst".into(),
            }],
            receipts: vec![ReceiptEntry {
                bytes: vec![4],
                contract: "0xcontract".into(),
                topic0s: vec!["0xtopic".into()],
            }],
            state_nodes: vec![],
            storage_nodes: vec![],
        };
        (published, payload)
    }

    #[tokio::test]
    async fn indexes_header_transaction_and_receipt() {
        let store = Arc::new(FakeIndexStore::new());
        let repo = IndexRepository::new(store.clone(), 1);
        let (published, payload) = sample();

        repo.index(&published, &payload).await.unwrap();

        assert_eq!(store.header_count(), 2); // canonical + uncle
    }

    #[tokio::test]
    async fn reindexing_the_same_block_is_idempotent() {
        let store = Arc::new(FakeIndexStore::new());
        let repo = IndexRepository::new(store.clone(), 1);
        let (published, payload) = sample();

        repo.index(&published, &payload).await.unwrap();
        repo.index(&published, &payload).await.unwrap();

        assert_eq!(store.header_count(), 2);
    }

    #[tokio::test]
    async fn misaligned_payload_is_rejected_before_any_write() {
        let store = Arc::new(FakeIndexStore::new());
        let repo = IndexRepository::new(store.clone(), 1);
        let (published, mut payload) = sample();
        payload.receipts.clear();

        let result = repo.index(&published, &payload).await;

        assert!(result.is_err());
        assert_eq!(store.header_count(), 0);
    }
}
