//! Content addresses and the published counterpart of [`crate::entities::BlockPayload`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::{Address, HexHash};
use crate::errors::CidError;

/// An opaque content address returned by the object store.
///
/// Printable, 46-64 characters (a base32/base58-encoded multihash in
/// practice). Equal-bytes inputs must yield equal [`Cid`]s — the object
/// store adapter is the only thing allowed to mint one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Validate and wrap a CID string returned by the object store.
    pub fn new(value: impl Into<String>) -> Result<Self, CidError> {
        let value = value.into();
        let len = value.chars().count();
        if !(46..=64).contains(&len) {
            return Err(CidError::InvalidLength(len));
        }
        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(CidError::NotPrintable);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// CID for a transaction, keyed by its hash so `index-repository` can upsert
/// on `(header_row_id, tx_hash)` without re-deriving the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionCid {
    pub hash: HexHash,
    pub cid: Cid,
    pub src: Address,
    pub dst: Address,
}

/// CID for the receipt aligned with [`TransactionCid`] at the same index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptCid {
    pub cid: Cid,
    pub contract: Address,
    pub topic0s: Vec<HexHash>,
}

/// CID for an uncle header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncleCid {
    pub hash: HexHash,
    pub cid: Cid,
}

/// CID for a state-trie node diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNodeCid {
    pub state_key: HexHash,
    pub cid: Cid,
    pub leaf: bool,
}

/// CID for a storage-trie node diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNodeCid {
    pub state_key: HexHash,
    pub storage_key: HexHash,
    pub cid: Cid,
    pub leaf: bool,
}

/// The output of `content-publisher`: [`crate::entities::BlockPayload`] with
/// every byte blob replaced by its [`Cid`], metadata carried through
/// unchanged (§4.2: "mirrors BlockPayload shape").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedCids {
    pub block_number: u64,
    pub block_hash: HexHash,
    pub header: Cid,
    pub uncles: Vec<UncleCid>,
    /// Ordered the same as the source payload; `receipts[i]` matches `transactions[i]`.
    pub transactions: Vec<TransactionCid>,
    pub receipts: Vec<ReceiptCid>,
    pub state_nodes: Vec<StateNodeCid>,
    pub storage_nodes: Vec<StorageNodeCid>,
}

/// The result of one `cid-retriever` call: CIDs for a single block, grouped
/// by component category, carrying enough metadata (hash, src/dst,
/// contract/topic0s) that `screener-server`'s historical replay can resolve
/// each CID to bytes and reassemble a [`crate::entities::BlockPayload`]-shaped
/// response (§4.4, §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CidBundle {
    pub block_number: u64,
    pub block_hash: HexHash,
    pub headers: Vec<Cid>,
    pub uncles: Vec<UncleCid>,
    pub transactions: Vec<TransactionCid>,
    pub receipts: Vec<ReceiptCid>,
    pub state_nodes: Vec<StateNodeCid>,
    pub storage_nodes: Vec<StorageNodeCid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_cid() {
        assert!(matches!(Cid::new("short"), Err(CidError::InvalidLength(_))));
    }

    #[test]
    fn accepts_typical_cid() {
        let v1 = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
        assert!(Cid::new(v1).is_ok());
    }

    #[test]
    fn equal_bytes_produce_equal_cids() {
        let a = Cid::new("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").unwrap();
        let b = Cid::new("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").unwrap();
        assert_eq!(a, b);
    }
}
