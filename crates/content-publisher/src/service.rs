//! Publishes every component of a block concurrently; any single failure
//! aborts the whole block with none of it durably recorded (§4.2).

use async_trait::async_trait;
use futures::future::try_join_all;
use shared_types::cid::{
    Cid, PublishedCids, ReceiptCid, StateNodeCid, StorageNodeCid, TransactionCid, UncleCid,
};
use shared_types::entities::BlockPayload;
use shared_types::errors::PublishError;
use std::sync::Arc;

use crate::ports::inbound::ContentPublisherApi;
use crate::ports::outbound::ObjectStore;

pub struct ContentPublisher<S: ObjectStore> {
    store: Arc<S>,
}

impl<S: ObjectStore> ContentPublisher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<Cid, PublishError> {
        self.store.put(bytes).await
    }
}

#[async_trait]
impl<S: ObjectStore> ContentPublisherApi for ContentPublisher<S> {
    async fn publish(&self, payload: &BlockPayload) -> Result<PublishedCids, PublishError> {
        let header_fut = self.put(payload.header_bytes.clone());

        let uncles_fut = try_join_all(payload.uncles.iter().map(|u| {
            let bytes = u.bytes.clone();
            let hash = u.hash.clone();
            async move {
                let cid = self.put(bytes).await?;
                Ok::<_, PublishError>(UncleCid { hash, cid })
            }
        }));

        let transactions_fut = try_join_all(payload.transactions.iter().map(|tx| {
            let bytes = tx.bytes.clone();
            let hash = tx.hash.clone();
            let src = tx.src.clone();
            let dst = tx.dst.clone();
            async move {
                let cid = self.put(bytes).await?;
                Ok::<_, PublishError>(TransactionCid { hash, cid, src, dst })
            }
        }));

        let receipts_fut = try_join_all(payload.receipts.iter().map(|receipt| {
            let bytes = receipt.bytes.clone();
            let contract = receipt.contract.clone();
            let topic0s = receipt.topic0s.clone();
            async move {
                let cid = self.put(bytes).await?;
                Ok::<_, PublishError>(ReceiptCid { cid, contract, topic0s })
            }
        }));

        let state_nodes_fut = try_join_all(payload.state_nodes.iter().map(|node| {
            let bytes = node.bytes.clone();
            let state_key = node.state_key.clone();
            let leaf = node.leaf;
            async move {
                let cid = self.put(bytes).await?;
                Ok::<_, PublishError>(StateNodeCid { state_key, cid, leaf })
            }
        }));

        let storage_nodes_fut = try_join_all(payload.storage_nodes.iter().map(|node| {
            let bytes = node.bytes.clone();
            let state_key = node.state_key.clone();
            let storage_key = node.storage_key.clone();
            let leaf = node.leaf;
            async move {
                let cid = self.put(bytes).await?;
                Ok::<_, PublishError>(StorageNodeCid {
                    state_key,
                    storage_key,
                    cid,
                    leaf,
                })
            }
        }));

        let (header, uncles, transactions, receipts, state_nodes, storage_nodes) = tokio::try_join!(
            header_fut,
            uncles_fut,
            transactions_fut,
            receipts_fut,
            state_nodes_fut,
            storage_nodes_fut,
        )
        .inspect_err(|_| telemetry::CAP_PUBLISH_FAILURES.inc())?;

        telemetry::BLOCKS_PUBLISHED.inc();
        tracing::debug!(
            stage = "content-publisher",
            block_number = payload.block_number,
            "published block"
        );

        Ok(PublishedCids {
            block_number: payload.block_number,
            block_hash: payload.block_hash.clone(),
            header,
            uncles,
            transactions,
            receipts,
            state_nodes,
            storage_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::InMemoryObjectStore;
    use shared_types::entities::{ReceiptEntry, TransactionEntry, UncleEntry};

    fn sample_payload() -> BlockPayload {
        BlockPayload {
            block_number: 10,
            block_hash: "0xabc".into(),
            header_bytes: vec![1, 2, 3],
            uncles: vec![UncleEntry {
                hash: "0xuncle".into(),
                bytes: vec![4, 5],
            }],
            transactions: vec![TransactionEntry {
                hash: "0xtx".into(),
                bytes: vec![6, 7],
                src: "0xsrc".into(),
                dst: "0xdst".into(),
            }],
            receipts: vec![ReceiptEntry {
                bytes: vec![8, 9],
                contract: "0xcontract".into(),
                topic0s: vec!["0xtopic".into()],
            }],
            state_nodes: vec![],
            storage_nodes: vec![],
        }
    }

    #[tokio::test]
    async fn publishes_every_component_and_returns_matching_cids() {
        let store = Arc::new(InMemoryObjectStore::new());
        let publisher = ContentPublisher::new(store.clone());

        let published = publisher.publish(&sample_payload()).await.unwrap();

        assert_eq!(published.block_number, 10);
        assert_eq!(published.uncles.len(), 1);
        assert_eq!(published.transactions.len(), 1);
        assert_eq!(published.receipts.len(), 1);
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn republishing_the_same_block_is_idempotent() {
        let store = Arc::new(InMemoryObjectStore::new());
        let publisher = ContentPublisher::new(store.clone());

        let first = publisher.publish(&sample_payload()).await.unwrap();
        let second = publisher.publish(&sample_payload()).await.unwrap();

        assert_eq!(first.header, second.header);
        assert_eq!(store.len().await, 4);
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl ObjectStore for FailingStore {
        async fn put(&self, _bytes: Vec<u8>) -> Result<Cid, PublishError> {
            Err(PublishError::PutFailed("disk full".into()))
        }

        async fn get(&self, _cid: &Cid) -> Result<Vec<u8>, PublishError> {
            Err(PublishError::GetFailed("disk full".into()))
        }
    }

    #[tokio::test]
    async fn any_component_failure_fails_the_whole_block() {
        let publisher = ContentPublisher::new(Arc::new(FailingStore));
        let result = publisher.publish(&sample_payload()).await;
        assert!(result.is_err());
    }
}
