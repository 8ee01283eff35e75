//! Pure validation done before a block ever touches the database.

use shared_types::entities::BlockPayload;
use shared_types::errors::IndexError;

/// The upstream payload's transaction/receipt counts must match before
/// indexing begins; a misaligned payload should never have been published
/// in the first place (§4.1's invariant re-checked at the IDX boundary).
pub fn ensure_aligned(payload: &BlockPayload) -> Result<(), IndexError> {
    if !payload.is_aligned() {
        return Err(IndexError::Constraint(format!(
            "block {} has {} transactions but {} receipts",
            payload.block_number,
            payload.transactions.len(),
            payload.receipts.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::entities::{ReceiptEntry, TransactionEntry};

    fn payload_with(tx_count: usize, receipt_count: usize) -> BlockPayload {
        BlockPayload {
            block_number: 1,
            block_hash: "0xabc".into(),
            header_bytes: vec![],
            uncles: vec![],
            transactions: (0..tx_count)
                .map(|i| TransactionEntry {
                    hash: format!("0xtx{i}"),
                    bytes: vec![],
                    src: "0xsrc".into(),
                    dst: "0xdst".into(),
                })
                .collect(),
            receipts: (0..receipt_count)
                .map(|_| ReceiptEntry {
                    bytes: vec![],
                    contract: String::new(),
                    topic0s: vec![],
                })
                .collect(),
            state_nodes: vec![],
            storage_nodes: vec![],
        }
    }

    #[test]
    fn aligned_payload_passes() {
        assert!(ensure_aligned(&payload_with(2, 2)).is_ok());
    }

    #[test]
    fn misaligned_payload_is_rejected() {
        assert!(ensure_aligned(&payload_with(2, 1)).is_err());
    }
}
