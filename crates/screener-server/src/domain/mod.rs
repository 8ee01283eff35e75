//! Predicate evaluation against an in-memory payload (§4.4/§4.5): the same
//! rules `cid-retriever` compiles to SQL, applied directly to a decoded
//! [`BlockPayload`] so live delivery needs no database round trip, plus the
//! CID-bundle-to-payload reconstruction historical replay resolves through
//! the object store.

use shared_types::entities::{BlockPayload, ReceiptEntry, TransactionEntry, UncleEntry};
use shared_types::filters::SubscriptionFilters;

use cid_retriever::domain::state_key_for_address;

/// The subset of `payload` matching `filters`, same shape as `payload` with
/// every non-matching component dropped (§4.5: "restricted to the
/// subscriber's filters").
pub fn filter_payload(payload: &BlockPayload, filters: &SubscriptionFilters) -> BlockPayload {
    let mut out = BlockPayload {
        block_number: payload.block_number,
        block_hash: payload.block_hash.clone(),
        ..Default::default()
    };

    if let Some(header) = filters.header.enabled() {
        out.header_bytes = payload.header_bytes.clone();
        if !header.final_only {
            out.uncles = payload.uncles.clone();
        }
    }

    let mut selected_tx_indices: Vec<usize> = Vec::new();
    if let Some(tx) = filters.tx.enabled() {
        for (i, t) in payload.transactions.iter().enumerate() {
            let src_ok = tx.src.is_empty() || tx.src.contains(&t.src);
            let dst_ok = tx.dst.is_empty() || tx.dst.contains(&t.dst);
            if src_ok && dst_ok {
                selected_tx_indices.push(i);
            }
        }
        out.transactions = selected_tx_indices.iter().map(|&i| payload.transactions[i].clone()).collect();
    }

    if let Some(receipt) = filters.receipt.enabled() {
        let has_topic = !receipt.topic0s.is_empty();
        let has_contract = !receipt.contracts.is_empty();
        for (i, r) in payload.receipts.iter().enumerate() {
            let topic_match = !has_topic || r.topic0s.iter().any(|t| receipt.topic0s.contains(t));
            let contract_match = !has_contract || receipt.contracts.contains(&r.contract);
            let topic_contract_match = (has_topic || has_contract) && topic_match && contract_match;
            let tx_match = selected_tx_indices.contains(&i);
            if topic_contract_match || tx_match {
                out.receipts.push(r.clone());
            }
        }
    }

    if let Some(state) = filters.state.enabled() {
        let keys: Vec<String> = state.addresses.iter().map(|a| state_key_for_address(a)).collect();
        out.state_nodes = payload
            .state_nodes
            .iter()
            .filter(|n| keys.is_empty() || keys.contains(&n.state_key))
            .filter(|n| state.intermediate_nodes || n.leaf)
            .cloned()
            .collect();
    }

    if let Some(storage) = filters.storage.enabled() {
        let keys: Vec<String> = storage.addresses.iter().map(|a| state_key_for_address(a)).collect();
        out.storage_nodes = payload
            .storage_nodes
            .iter()
            .filter(|n| keys.is_empty() || keys.contains(&n.state_key))
            .filter(|n| storage.storage_keys.is_empty() || storage.storage_keys.contains(&n.storage_key))
            .filter(|n| storage.intermediate_nodes || n.leaf)
            .cloned()
            .collect();
    }

    out
}

/// Reassembles a [`BlockPayload`] from a resolved [`shared_types::cid::CidBundle`]
/// given the bytes already fetched for each CID, in bundle order. Callers
/// resolve every CID to bytes first (see `Screener::replay_block`); a GET
/// failure there aborts that block's replay before this function runs.
pub fn payload_from_resolved(
    bundle: &shared_types::cid::CidBundle,
    header_bytes: Vec<u8>,
    uncle_bytes: Vec<Vec<u8>>,
    transaction_bytes: Vec<Vec<u8>>,
    receipt_bytes: Vec<Vec<u8>>,
    state_bytes: Vec<Vec<u8>>,
    storage_bytes: Vec<Vec<u8>>,
) -> BlockPayload {
    let uncles = bundle
        .uncles
        .iter()
        .zip(uncle_bytes)
        .map(|(u, bytes)| UncleEntry { hash: u.hash.clone(), bytes })
        .collect();

    let transactions = bundle
        .transactions
        .iter()
        .zip(transaction_bytes)
        .map(|(t, bytes)| TransactionEntry {
            hash: t.hash.clone(),
            bytes,
            src: t.src.clone(),
            dst: t.dst.clone(),
        })
        .collect();

    let receipts = bundle
        .receipts
        .iter()
        .zip(receipt_bytes)
        .map(|(r, bytes)| ReceiptEntry {
            bytes,
            contract: r.contract.clone(),
            topic0s: r.topic0s.clone(),
        })
        .collect();

    let state_nodes = bundle
        .state_nodes
        .iter()
        .zip(state_bytes)
        .map(|(s, bytes)| shared_types::entities::StateNodeEntry {
            state_key: s.state_key.clone(),
            bytes,
            leaf: s.leaf,
        })
        .collect();

    let storage_nodes = bundle
        .storage_nodes
        .iter()
        .zip(storage_bytes)
        .map(|(s, bytes)| shared_types::entities::StorageNodeEntry {
            state_key: s.state_key.clone(),
            storage_key: s.storage_key.clone(),
            bytes,
            leaf: s.leaf,
        })
        .collect();

    BlockPayload {
        block_number: bundle.block_number,
        block_hash: bundle.block_hash.clone(),
        header_bytes,
        uncles,
        transactions,
        receipts,
        state_nodes,
        storage_nodes,
    }
}
