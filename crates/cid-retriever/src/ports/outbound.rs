//! Outbound port: the read-only store `cid-retriever` queries.
//!
//! One query per enabled category, mirroring the teacher repository's
//! retrieval queries exactly (conflict targets, joins, and the receipt
//! disjunction all carry over from the Go reference this was distilled
//! from).

use async_trait::async_trait;
use shared_types::cid::{Cid, ReceiptCid, StateNodeCid, StorageNodeCid, UncleCid};
use shared_types::entities::{Address, HexHash};
use shared_types::errors::BackfillError;

/// One transaction row resolved for a block: its row id (receipts join on
/// it) plus the fields needed to reconstruct a [`shared_types::cid::TransactionCid`].
#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub row_id: i64,
    pub hash: HexHash,
    pub cid: Cid,
    pub src: Address,
    pub dst: Address,
}

#[async_trait]
pub trait RetrieverStore: Send + Sync {
    async fn header_cid(&self, block_number: u64) -> Result<Option<(HexHash, Cid)>, BackfillError>;
    async fn uncle_cids(&self, block_number: u64) -> Result<Vec<UncleCid>, BackfillError>;

    async fn transaction_rows(
        &self,
        block_number: u64,
        src: &[String],
        dst: &[String],
    ) -> Result<Vec<TransactionRow>, BackfillError>;

    async fn receipt_cids(
        &self,
        block_number: u64,
        topic0s: &[String],
        contracts: &[String],
        tx_ids: &[i64],
    ) -> Result<Vec<ReceiptCid>, BackfillError>;

    async fn state_node_cids(
        &self,
        block_number: u64,
        state_keys: &[String],
        leaf_only: bool,
    ) -> Result<Vec<StateNodeCid>, BackfillError>;

    async fn storage_node_cids(
        &self,
        block_number: u64,
        state_keys: &[String],
        storage_keys: &[String],
        leaf_only: bool,
    ) -> Result<Vec<StorageNodeCid>, BackfillError>;

    async fn first_block_number(&self) -> Result<Option<u64>, BackfillError>;
    async fn last_block_number(&self) -> Result<Option<u64>, BackfillError>;

    /// Contiguous `[start, stop]` ranges missing from `header_cids`,
    /// computed with the same self-join as the teacher's `RetrieveGapsInData`.
    async fn gaps_in_data(&self) -> Result<Vec<(u64, u64)>, BackfillError>;
}

pub struct PgRetrieverStore {
    pool: sqlx::PgPool,
}

impl PgRetrieverStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RetrieverStore for PgRetrieverStore {
    async fn header_cid(&self, block_number: u64) -> Result<Option<(HexHash, Cid)>, BackfillError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT block_hash, cid FROM header_cids WHERE block_number = $1 AND uncle IS FALSE",
        )
        .bind(block_number as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;
        Ok(row.and_then(|(hash, cid)| Cid::new(cid).ok().map(|cid| (hash, cid))))
    }

    async fn uncle_cids(&self, block_number: u64) -> Result<Vec<UncleCid>, BackfillError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT block_hash, cid FROM header_cids WHERE block_number = $1 AND uncle IS TRUE",
        )
        .bind(block_number as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;
        Ok(rows
            .into_iter()
            .filter_map(|(hash, cid)| Cid::new(cid).ok().map(|cid| UncleCid { hash, cid }))
            .collect())
    }

    async fn transaction_rows(
        &self,
        block_number: u64,
        src: &[String],
        dst: &[String],
    ) -> Result<Vec<TransactionRow>, BackfillError> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "SELECT transaction_cids.id, transaction_cids.tx_hash, transaction_cids.cid,
                    transaction_cids.src, transaction_cids.dst
             FROM transaction_cids
             INNER JOIN header_cids ON transaction_cids.header_id = header_cids.id
             WHERE header_cids.block_number = ",
        );
        builder.push_bind(block_number as i64);
        if !dst.is_empty() {
            builder.push(" AND transaction_cids.dst = ANY(").push_bind(dst).push(")");
        }
        if !src.is_empty() {
            builder.push(" AND transaction_cids.src = ANY(").push_bind(src).push(")");
        }

        let rows: Vec<(i64, String, String, String, String)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, hash, cid, src, dst)| {
                Cid::new(cid).ok().map(|cid| TransactionRow { row_id: id, hash, cid, src, dst })
            })
            .collect())
    }

    async fn receipt_cids(
        &self,
        block_number: u64,
        topic0s: &[String],
        contracts: &[String],
        tx_ids: &[i64],
    ) -> Result<Vec<ReceiptCid>, BackfillError> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "SELECT receipt_cids.cid, receipt_cids.contract, receipt_cids.topic0s
             FROM receipt_cids, transaction_cids, header_cids
             WHERE receipt_cids.tx_id = transaction_cids.id
             AND transaction_cids.header_id = header_cids.id
             AND header_cids.block_number = ",
        );
        builder.push_bind(block_number as i64);

        let has_topic = !topic0s.is_empty();
        let has_contract = !contracts.is_empty();
        let has_tx = !tx_ids.is_empty();

        if has_topic || has_contract || has_tx {
            builder.push(" AND (");
            let mut first = true;

            if has_topic || has_contract {
                builder.push("(");
                if has_topic {
                    builder.push("receipt_cids.topic0s && ").push_bind(topic0s);
                }
                if has_topic && has_contract {
                    builder.push(" AND ");
                }
                if has_contract {
                    builder.push("receipt_cids.contract = ANY(").push_bind(contracts).push(")");
                }
                builder.push(")");
                first = false;
            }
            if has_tx {
                if !first {
                    builder.push(" OR ");
                }
                builder.push("receipt_cids.tx_id = ANY(").push_bind(tx_ids).push(")");
            }
            builder.push(")");
        }

        let rows: Vec<(String, String, Vec<String>)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;
        Ok(rows
            .into_iter()
            .filter_map(|(cid, contract, topic0s)| {
                Cid::new(cid).ok().map(|cid| ReceiptCid { cid, contract, topic0s })
            })
            .collect())
    }

    async fn state_node_cids(
        &self,
        block_number: u64,
        state_keys: &[String],
        leaf_only: bool,
    ) -> Result<Vec<StateNodeCid>, BackfillError> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "SELECT state_cids.cid, state_cids.state_key, state_cids.leaf FROM state_cids
             INNER JOIN header_cids ON state_cids.header_id = header_cids.id
             WHERE header_cids.block_number = ",
        );
        builder.push_bind(block_number as i64);
        if !state_keys.is_empty() {
            builder.push(" AND state_cids.state_key = ANY(").push_bind(state_keys).push(")");
        }
        if leaf_only {
            builder.push(" AND state_cids.leaf = TRUE");
        }

        let rows: Vec<(String, String, bool)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(cid, state_key, leaf)| {
                Cid::new(cid).ok().map(|cid| StateNodeCid { state_key, cid, leaf })
            })
            .collect())
    }

    async fn storage_node_cids(
        &self,
        block_number: u64,
        state_keys: &[String],
        storage_keys: &[String],
        leaf_only: bool,
    ) -> Result<Vec<StorageNodeCid>, BackfillError> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "SELECT storage_cids.cid, state_cids.state_key, storage_cids.storage_key, storage_cids.leaf
             FROM storage_cids, state_cids, header_cids
             WHERE storage_cids.state_id = state_cids.id
             AND state_cids.header_id = header_cids.id
             AND header_cids.block_number = ",
        );
        builder.push_bind(block_number as i64);
        if !state_keys.is_empty() {
            builder.push(" AND state_cids.state_key = ANY(").push_bind(state_keys).push(")");
        }
        if !storage_keys.is_empty() {
            builder.push(" AND storage_cids.storage_key = ANY(").push_bind(storage_keys).push(")");
        }
        if leaf_only {
            builder.push(" AND storage_cids.leaf = TRUE");
        }

        let rows: Vec<(String, String, String, bool)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(cid, state_key, storage_key, leaf)| {
                Cid::new(cid).ok().map(|cid| StorageNodeCid {
                    state_key,
                    storage_key,
                    cid,
                    leaf,
                })
            })
            .collect())
    }

    async fn first_block_number(&self) -> Result<Option<u64>, BackfillError> {
        let n: Option<i64> = sqlx::query_scalar(
            "SELECT block_number FROM header_cids ORDER BY block_number ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;
        Ok(n.map(|n| n as u64))
    }

    async fn last_block_number(&self) -> Result<Option<u64>, BackfillError> {
        let n: Option<i64> = sqlx::query_scalar(
            "SELECT block_number FROM header_cids ORDER BY block_number DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;
        Ok(n.map(|n| n as u64))
    }

    async fn gaps_in_data(&self) -> Result<Vec<(u64, u64)>, BackfillError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT header_cids.block_number + 1 AS start, min(fr.block_number) - 1 AS stop FROM header_cids
             LEFT JOIN header_cids r ON header_cids.block_number = r.block_number - 1
             LEFT JOIN header_cids fr ON header_cids.block_number < fr.block_number
             WHERE r.block_number IS NULL AND fr.block_number IS NOT NULL
             GROUP BY header_cids.block_number, r.block_number",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BackfillError::ArchivalUpstream(e.to_string()))?;
        Ok(rows.into_iter().map(|(start, stop)| (start as u64, stop as u64)).collect())
    }
}

/// In-memory store for tests: plain `Vec`s standing in for the five tables,
/// filtered in Rust the same way the Postgres adapter filters in SQL.
pub mod fakes {
    use super::*;

    pub struct HeaderRow {
        pub block_number: u64,
        pub hash: &'static str,
        pub cid: &'static str,
        pub uncle: bool,
    }

    pub struct TxRow {
        pub id: i64,
        pub block_number: u64,
        pub hash: &'static str,
        pub cid: &'static str,
        pub src: &'static str,
        pub dst: &'static str,
    }

    pub struct ReceiptRow {
        pub tx_id: i64,
        pub cid: &'static str,
        pub contract: &'static str,
        pub topic0s: Vec<&'static str>,
    }

    pub struct StateRow {
        pub block_number: u64,
        pub cid: &'static str,
        pub state_key: &'static str,
        pub leaf: bool,
    }

    pub struct StorageRow {
        pub state_key: &'static str,
        pub cid: &'static str,
        pub storage_key: &'static str,
        pub leaf: bool,
    }

    #[derive(Default)]
    pub struct FakeRetrieverStore {
        pub headers: Vec<HeaderRow>,
        pub transactions: Vec<TxRow>,
        pub receipts: Vec<ReceiptRow>,
        pub state_nodes: Vec<StateRow>,
        pub storage_nodes: Vec<StorageRow>,
    }

    #[async_trait]
    impl RetrieverStore for FakeRetrieverStore {
        async fn header_cid(&self, block_number: u64) -> Result<Option<(HexHash, Cid)>, BackfillError> {
            Ok(self
                .headers
                .iter()
                .find(|h| h.block_number == block_number && !h.uncle)
                .and_then(|h| Cid::new(h.cid).ok().map(|cid| (h.hash.to_string(), cid))))
        }

        async fn uncle_cids(&self, block_number: u64) -> Result<Vec<UncleCid>, BackfillError> {
            Ok(self
                .headers
                .iter()
                .filter(|h| h.block_number == block_number && h.uncle)
                .filter_map(|h| Cid::new(h.cid).ok().map(|cid| UncleCid { hash: h.hash.to_string(), cid }))
                .collect())
        }

        async fn transaction_rows(
            &self,
            block_number: u64,
            src: &[String],
            dst: &[String],
        ) -> Result<Vec<TransactionRow>, BackfillError> {
            Ok(self
                .transactions
                .iter()
                .filter(|t| t.block_number == block_number)
                .filter(|t| dst.is_empty() || dst.iter().any(|d| d == t.dst))
                .filter(|t| src.is_empty() || src.iter().any(|s| s == t.src))
                .filter_map(|t| {
                    Cid::new(t.cid).ok().map(|cid| TransactionRow {
                        row_id: t.id,
                        hash: t.hash.to_string(),
                        cid,
                        src: t.src.to_string(),
                        dst: t.dst.to_string(),
                    })
                })
                .collect())
        }

        async fn receipt_cids(
            &self,
            block_number: u64,
            topic0s: &[String],
            contracts: &[String],
            tx_ids: &[i64],
        ) -> Result<Vec<ReceiptCid>, BackfillError> {
            let block_tx_ids: Vec<i64> = self
                .transactions
                .iter()
                .filter(|t| t.block_number == block_number)
                .map(|t| t.id)
                .collect();

            Ok(self
                .receipts
                .iter()
                .filter(|r| block_tx_ids.contains(&r.tx_id))
                .filter(|r| {
                    let has_topic = !topic0s.is_empty();
                    let has_contract = !contracts.is_empty();
                    let has_tx = !tx_ids.is_empty();

                    let topic_match = !has_topic || r.topic0s.iter().any(|t| topic0s.iter().any(|x| x == t));
                    let contract_match = !has_contract || contracts.iter().any(|c| c == r.contract);
                    let topic_contract_match = (has_topic || has_contract) && topic_match && contract_match;
                    let tx_id_match = has_tx && tx_ids.contains(&r.tx_id);

                    if !has_topic && !has_contract && !has_tx {
                        false
                    } else {
                        topic_contract_match || tx_id_match
                    }
                })
                .filter_map(|r| {
                    Cid::new(r.cid).ok().map(|cid| ReceiptCid {
                        cid,
                        contract: r.contract.to_string(),
                        topic0s: r.topic0s.iter().map(|t| t.to_string()).collect(),
                    })
                })
                .collect())
        }

        async fn state_node_cids(
            &self,
            block_number: u64,
            state_keys: &[String],
            leaf_only: bool,
        ) -> Result<Vec<StateNodeCid>, BackfillError> {
            Ok(self
                .state_nodes
                .iter()
                .filter(|s| s.block_number == block_number)
                .filter(|s| state_keys.is_empty() || state_keys.iter().any(|k| k == s.state_key))
                .filter(|s| !leaf_only || s.leaf)
                .filter_map(|s| {
                    Cid::new(s.cid).ok().map(|cid| StateNodeCid {
                        state_key: s.state_key.to_string(),
                        cid,
                        leaf: s.leaf,
                    })
                })
                .collect())
        }

        async fn storage_node_cids(
            &self,
            block_number: u64,
            state_keys: &[String],
            storage_keys: &[String],
            leaf_only: bool,
        ) -> Result<Vec<StorageNodeCid>, BackfillError> {
            let block_state_keys: Vec<&str> = self
                .state_nodes
                .iter()
                .filter(|s| s.block_number == block_number)
                .map(|s| s.state_key)
                .collect();

            Ok(self
                .storage_nodes
                .iter()
                .filter(|s| block_state_keys.contains(&s.state_key))
                .filter(|s| state_keys.is_empty() || state_keys.iter().any(|k| k == s.state_key))
                .filter(|s| storage_keys.is_empty() || storage_keys.iter().any(|k| k == s.storage_key))
                .filter(|s| !leaf_only || s.leaf)
                .filter_map(|s| {
                    Cid::new(s.cid).ok().map(|cid| StorageNodeCid {
                        state_key: s.state_key.to_string(),
                        storage_key: s.storage_key.to_string(),
                        cid,
                        leaf: s.leaf,
                    })
                })
                .collect())
        }

        async fn first_block_number(&self) -> Result<Option<u64>, BackfillError> {
            Ok(self.headers.iter().map(|h| h.block_number).min())
        }

        async fn last_block_number(&self) -> Result<Option<u64>, BackfillError> {
            Ok(self.headers.iter().map(|h| h.block_number).max())
        }

        async fn gaps_in_data(&self) -> Result<Vec<(u64, u64)>, BackfillError> {
            let mut numbers: Vec<u64> = self.headers.iter().map(|h| h.block_number).collect();
            numbers.sort_unstable();
            numbers.dedup();

            let mut gaps = Vec::new();
            for pair in numbers.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if b > a + 1 {
                    gaps.push((a + 1, b - 1));
                }
            }
            Ok(gaps)
        }
    }
}
