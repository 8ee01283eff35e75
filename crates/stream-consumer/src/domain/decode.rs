//! Frame-to-payload decoding (§4.1, §6).

use shared_types::{
    BlockPayload, DecodeError, ReceiptEntry, StateNodeEntry, StorageNodeEntry, TransactionEntry,
    UncleEntry,
};

use crate::ports::outbound::ChainCodec;

/// Decode one upstream frame into a [`BlockPayload`], deriving `src`/`dst`
/// per transaction and `contract`/`topic0s` per receipt via `codec`.
///
/// Strict: a node-reported `errMsg`, or transaction/receipt counts that
/// don't align 1:1, is a [`DecodeError`] — the caller logs and drops the
/// frame rather than propagating it as fatal (§4.1).
pub fn decode_frame(
    frame: shared_types::ipc::UpstreamFrame,
    codec: &dyn ChainCodec,
) -> Result<BlockPayload, DecodeError> {
    if !frame.err_msg.is_empty() {
        return Err(DecodeError::NodeError(frame.err_msg));
    }

    if frame.transactions_rlp.len() != frame.receipts_rlp.len() {
        return Err(DecodeError::Misaligned {
            transactions: frame.transactions_rlp.len(),
            receipts: frame.receipts_rlp.len(),
        });
    }

    let block_hash = codec.header_hash(&frame.headers_rlp)?;

    let uncles = frame
        .uncles_rlp
        .into_iter()
        .map(|u| UncleEntry {
            hash: u.hash,
            bytes: u.bytes,
        })
        .collect();

    let mut transactions = Vec::with_capacity(frame.transactions_rlp.len());
    for tx_bytes in &frame.transactions_rlp {
        let hash = codec.transaction_hash(tx_bytes)?;
        let src = codec.recover_sender(tx_bytes)?;
        let dst = codec.recipient(tx_bytes)?;
        transactions.push(TransactionEntry {
            hash,
            bytes: tx_bytes.clone(),
            src,
            dst,
        });
    }

    let mut receipts = Vec::with_capacity(frame.receipts_rlp.len());
    for receipt_bytes in &frame.receipts_rlp {
        let (contract, topic0s) = codec.receipt_contract_and_topics(receipt_bytes)?;
        receipts.push(ReceiptEntry {
            bytes: receipt_bytes.clone(),
            contract,
            topic0s,
        });
    }

    let state_nodes = frame
        .state_nodes_rlp
        .into_iter()
        .map(|(state_key, node)| StateNodeEntry {
            state_key,
            bytes: node.bytes,
            leaf: node.leaf,
        })
        .collect();

    let storage_nodes = frame
        .storage_nodes_rlp
        .into_iter()
        .flat_map(|(state_key, by_storage_key)| {
            by_storage_key
                .into_iter()
                .map(move |(storage_key, node)| StorageNodeEntry {
                    state_key: state_key.clone(),
                    storage_key,
                    bytes: node.bytes,
                    leaf: node.leaf,
                })
        })
        .collect();

    let payload = BlockPayload {
        block_number: frame.block_number,
        block_hash,
        header_bytes: frame.headers_rlp,
        uncles,
        transactions,
        receipts,
        state_nodes,
        storage_nodes,
    };

    if !payload.is_aligned() {
        return Err(DecodeError::Misaligned {
            transactions: payload.transactions.len(),
            receipts: payload.receipts.len(),
        });
    }

    Ok(payload)
}
