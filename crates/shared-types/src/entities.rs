//! Core data model: the transient [`BlockPayload`] decoded by `stream-consumer`
//! and the content-addressed [`crate::cid::PublishedCids`] it turns into.

use serde::{Deserialize, Serialize};

/// 32-byte digest rendered as a lowercase `0x`-prefixed hex string.
///
/// Block hashes, transaction hashes, state keys, storage keys, and topic0s
/// are all this shape; keeping them as hex strings (rather than `[u8; 32]`)
/// means they serialize identically to the upstream JSON frames and to the
/// `VARCHAR` columns `index-repository` writes them into.
pub type HexHash = String;

/// Account address, lowercase `0x`-prefixed hex. Empty string stands in for
/// "no address" (contract creation `dst`, or a receipt with no log).
pub type Address = String;

/// A single uncle header carried alongside the canonical header of a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncleEntry {
    pub hash: HexHash,
    pub bytes: Vec<u8>,
}

/// A transaction plus the fields `stream-consumer` derives from its decoded
/// signature and recipient (§6: "Derived-field computation rules").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub hash: HexHash,
    pub bytes: Vec<u8>,
    /// Signer address recovered from the transaction's signature and chain id.
    pub src: Address,
    /// `to` address, or empty for contract creation.
    pub dst: Address,
}

/// The receipt for the transaction at the same index in
/// [`BlockPayload::transactions`], plus derived `contract`/`topic0s`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub bytes: Vec<u8>,
    /// Address that emitted the receipt's first log, or empty.
    pub contract: Address,
    /// First topic of every log in the receipt, in log order. Empty (never
    /// null) when the receipt has zero logs.
    pub topic0s: Vec<HexHash>,
}

/// One state-trie node diff produced by executing the block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNodeEntry {
    pub state_key: HexHash,
    pub bytes: Vec<u8>,
    pub leaf: bool,
}

/// One storage-trie node diff, scoped to the account identified by
/// `state_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNodeEntry {
    pub state_key: HexHash,
    pub storage_key: HexHash,
    pub bytes: Vec<u8>,
    pub leaf: bool,
}

/// The decoded, per-block payload that flows from `stream-consumer` into the
/// `content-publisher` / `index-repository` / `screener-server` fan-out.
///
/// Transient by design (§3): it lives for exactly one pipeline pass and is
/// dropped once publication, indexing, and subscriber fan-out all complete.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlockPayload {
    pub block_number: u64,
    pub block_hash: HexHash,
    pub header_bytes: Vec<u8>,
    pub uncles: Vec<UncleEntry>,
    /// Ordered; `receipts[i]` is the receipt for `transactions[i]`.
    pub transactions: Vec<TransactionEntry>,
    pub receipts: Vec<ReceiptEntry>,
    pub state_nodes: Vec<StateNodeEntry>,
    pub storage_nodes: Vec<StorageNodeEntry>,
}

impl BlockPayload {
    /// `true` once every receipt has a matching transaction at the same index.
    ///
    /// `stream-consumer` asserts this before emitting a payload; a frame that
    /// fails it is a decode error, not a payload bug.
    pub fn is_aligned(&self) -> bool {
        self.transactions.len() == self.receipts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_payload_is_aligned() {
        assert!(BlockPayload::default().is_aligned());
    }

    #[test]
    fn mismatched_lengths_are_not_aligned() {
        let mut payload = BlockPayload::default();
        payload.transactions.push(TransactionEntry {
            hash: "0xaa".into(),
            bytes: vec![1],
            src: "0x1".into(),
            dst: "0x2".into(),
        });
        assert!(!payload.is_aligned());
    }
}
