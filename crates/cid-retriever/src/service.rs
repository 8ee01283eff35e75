//! Compiles a predicate set into the per-category queries and assembles one
//! [`CidBundle`] per requested block (§4.4).

use async_trait::async_trait;
use shared_types::cid::CidBundle;
use shared_types::errors::BackfillError;
use shared_types::filters::SubscriptionFilters;
use std::sync::Arc;

use crate::domain::state_key_for_address;
use crate::ports::inbound::CidRetrieverApi;
use crate::ports::outbound::RetrieverStore;

pub struct CidRetriever<S: RetrieverStore> {
    store: Arc<S>,
}

impl<S: RetrieverStore> CidRetriever<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: RetrieverStore> CidRetrieverApi for CidRetriever<S> {
    async fn retrieve(
        &self,
        filters: &SubscriptionFilters,
        block_number: u64,
    ) -> Result<CidBundle, BackfillError> {
        let mut bundle = CidBundle {
            block_number,
            ..Default::default()
        };

        if let Some(header) = filters.header.enabled() {
            if let Some((hash, cid)) = self.store.header_cid(block_number).await? {
                bundle.block_hash = hash;
                bundle.headers.push(cid);
            }
            if !header.final_only {
                bundle.uncles = self.store.uncle_cids(block_number).await?;
            }
        }

        let mut tx_ids: Vec<i64> = Vec::new();
        if let Some(tx) = filters.tx.enabled() {
            let rows = self.store.transaction_rows(block_number, &tx.src, &tx.dst).await?;
            tx_ids = rows.iter().map(|r| r.row_id).collect();
            bundle.transactions = rows
                .into_iter()
                .map(|r| shared_types::cid::TransactionCid {
                    hash: r.hash,
                    cid: r.cid,
                    src: r.src,
                    dst: r.dst,
                })
                .collect();
        }

        if let Some(receipt) = filters.receipt.enabled() {
            bundle.receipts = self
                .store
                .receipt_cids(block_number, &receipt.topic0s, &receipt.contracts, &tx_ids)
                .await?;
        }

        if let Some(state) = filters.state.enabled() {
            let state_keys: Vec<String> = state.addresses.iter().map(|a| state_key_for_address(a)).collect();
            bundle.state_nodes = self
                .store
                .state_node_cids(block_number, &state_keys, !state.intermediate_nodes)
                .await?;
        }

        if let Some(storage) = filters.storage.enabled() {
            let state_keys: Vec<String> = storage.addresses.iter().map(|a| state_key_for_address(a)).collect();
            bundle.storage_nodes = self
                .store
                .storage_node_cids(block_number, &state_keys, &storage.storage_keys, !storage.intermediate_nodes)
                .await?;
        }

        telemetry::RET_QUERIES.inc();
        Ok(bundle)
    }

    async fn first_block_number(&self) -> Result<Option<u64>, BackfillError> {
        self.store.first_block_number().await
    }

    async fn last_block_number(&self) -> Result<Option<u64>, BackfillError> {
        self.store.last_block_number().await
    }

    async fn gaps_in_data(&self) -> Result<Vec<(u64, u64)>, BackfillError> {
        self.store.gaps_in_data().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::fakes::{FakeRetrieverStore, HeaderRow, ReceiptRow, TxRow};
    use shared_types::filters::{CategoryFilter, HeaderFields, ReceiptFields, TxFields};

    const HEADER_CID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const UNCLE_CID: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const TX_CID: &str = "cccccccccccccccccccccccccccccccccccccccccccccccc";
    const RECEIPT_CID: &str = "dddddddddddddddddddddddddddddddddddddddddddddddd";

    fn store_with_one_block() -> FakeRetrieverStore {
        FakeRetrieverStore {
            headers: vec![
                HeaderRow { block_number: 1, hash: "0xblockhash", cid: HEADER_CID, uncle: false },
                HeaderRow { block_number: 1, hash: "0xunclehash", cid: UNCLE_CID, uncle: true },
            ],
            transactions: vec![TxRow {
                id: 10,
                block_number: 1,
                hash: "0xtxhash",
                cid: TX_CID,
                src: "0xsrc",
                dst: "0xdst",
            }],
            receipts: vec![ReceiptRow {
                tx_id: 10,
                cid: RECEIPT_CID,
                contract: "0xcontract",
                topic0s: vec!["0xtopic"],
            }],
            state_nodes: vec![],
            storage_nodes: vec![],
        }
    }

    #[tokio::test]
    async fn header_filter_returns_canonical_and_uncle_cids() {
        let retriever = CidRetriever::new(Arc::new(store_with_one_block()));
        let mut filters = SubscriptionFilters::none();
        filters.header = CategoryFilter::On(HeaderFields { final_only: false });

        let bundle = retriever.retrieve(&filters, 1).await.unwrap();

        assert_eq!(bundle.headers.len(), 1);
        assert_eq!(bundle.uncles.len(), 1);
    }

    #[tokio::test]
    async fn final_only_suppresses_uncles() {
        let retriever = CidRetriever::new(Arc::new(store_with_one_block()));
        let mut filters = SubscriptionFilters::none();
        filters.header = CategoryFilter::On(HeaderFields { final_only: true });

        let bundle = retriever.retrieve(&filters, 1).await.unwrap();

        assert_eq!(bundle.headers.len(), 1);
        assert!(bundle.uncles.is_empty());
    }

    #[tokio::test]
    async fn topic_only_filter_matches_without_a_contract() {
        let retriever = CidRetriever::new(Arc::new(store_with_one_block()));
        let mut filters = SubscriptionFilters::none();
        filters.receipt = CategoryFilter::On(ReceiptFields {
            topic0s: vec!["0xtopic".into()],
            contracts: vec![],
        });

        let bundle = retriever.retrieve(&filters, 1).await.unwrap();

        // an empty sub-predicate is dropped, not treated as unsatisfiable:
        // topic0 alone is enough to match here.
        assert_eq!(bundle.receipts.len(), 1);
    }

    #[tokio::test]
    async fn contract_only_filter_matches_without_a_topic() {
        let retriever = CidRetriever::new(Arc::new(store_with_one_block()));
        let mut filters = SubscriptionFilters::none();
        filters.receipt = CategoryFilter::On(ReceiptFields {
            topic0s: vec![],
            contracts: vec!["0xcontract".into()],
        });

        let bundle = retriever.retrieve(&filters, 1).await.unwrap();

        assert_eq!(bundle.receipts.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_topic_with_no_contract_filter_does_not_match() {
        let retriever = CidRetriever::new(Arc::new(store_with_one_block()));
        let mut filters = SubscriptionFilters::none();
        filters.receipt = CategoryFilter::On(ReceiptFields {
            topic0s: vec!["0xsomethingelse".into()],
            contracts: vec![],
        });

        let bundle = retriever.retrieve(&filters, 1).await.unwrap();

        assert!(bundle.receipts.is_empty());
    }

    #[tokio::test]
    async fn receipt_belonging_to_selected_tx_is_returned_even_without_topic_match() {
        let retriever = CidRetriever::new(Arc::new(store_with_one_block()));
        let mut filters = SubscriptionFilters::none();
        filters.tx = CategoryFilter::On(TxFields::default());
        filters.receipt = CategoryFilter::On(ReceiptFields::default());

        let bundle = retriever.retrieve(&filters, 1).await.unwrap();

        assert_eq!(bundle.receipts.len(), 1);
    }

    #[tokio::test]
    async fn gaps_in_data_reports_missing_ranges() {
        let store = FakeRetrieverStore {
            headers: vec![
                HeaderRow { block_number: 1, hash: "0xh1", cid: HEADER_CID, uncle: false },
                HeaderRow { block_number: 5, hash: "0xh5", cid: UNCLE_CID, uncle: false },
            ],
            transactions: vec![],
            receipts: vec![],
            state_nodes: vec![],
            storage_nodes: vec![],
        };
        let retriever = CidRetriever::new(Arc::new(store));

        let gaps = retriever.gaps_in_data().await.unwrap();

        assert_eq!(gaps, vec![(2, 4)]);
    }
}
