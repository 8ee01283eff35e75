//! Real [`ChainCodec`]: legacy-RLP transaction/receipt decoding and ECDSA
//! signer recovery (§6 "Derived-field computation rules").
//!
//! EIP-2718 typed transactions (the `0x01`/`0x02`/`0x03` envelope prefixes)
//! are not decoded here; a block containing one is reported as a
//! [`DecodeError::MalformedFrame`] and dropped per `stream-consumer`'s
//! non-fatal strict-decode policy rather than guessed at.

use rlp::Rlp;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};
use sha3::{Digest, Keccak256};

use shared_types::{Address, DecodeError, HexHash};
use stream_consumer::ports::outbound::ChainCodec;

pub struct RealChainCodec;

fn keccak_hex(bytes: &[u8]) -> HexHash {
    format!("0x{}", hex::encode(Keccak256::digest(bytes)))
}

fn address_hex(bytes: &[u8]) -> Address {
    if bytes.is_empty() {
        String::new()
    } else {
        format!("0x{}", hex::encode(bytes))
    }
}

fn topic_hex(bytes: &[u8]) -> HexHash {
    format!("0x{}", hex::encode(bytes))
}

fn reject_typed(tx_bytes: &[u8]) -> Result<(), DecodeError> {
    match tx_bytes.first() {
        Some(0x01) | Some(0x02) | Some(0x03) => Err(DecodeError::MalformedFrame(
            "typed (EIP-2718) transactions are not supported".to_string(),
        )),
        _ => Ok(()),
    }
}

fn rlp_err(context: &str) -> impl Fn(rlp::DecoderError) -> DecodeError + '_ {
    move |e| DecodeError::MalformedFrame(format!("{context}: {e}"))
}

/// `v` for a legacy transaction encodes both the recovery id and (post
/// EIP-155) the chain id: `v = recId + 35 + 2*chainId`, or the bare
/// `27/28` for pre-EIP-155 transactions.
fn recovery_id_and_chain_id(v: u64) -> (u8, Option<u64>) {
    if v == 27 || v == 28 {
        ((v - 27) as u8, None)
    } else if v >= 35 {
        (((v - 35) % 2) as u8, Some((v - 35) / 2))
    } else {
        ((v % 2) as u8, None)
    }
}

/// Rebuilds the RLP payload that was signed: the six core fields, plus
/// `(chainId, 0, 0)` for an EIP-155 signature.
fn signing_payload(tx: &Rlp, chain_id: Option<u64>) -> Result<Vec<u8>, DecodeError> {
    let mut stream = rlp::RlpStream::new();
    let field_count = if chain_id.is_some() { 9 } else { 6 };
    stream.begin_list(field_count);
    for i in 0..6 {
        stream.append_raw(tx.at(i).map_err(rlp_err("signing payload field"))?.as_raw(), 1);
    }
    if let Some(chain_id) = chain_id {
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
    }
    Ok(stream.out().to_vec())
}

impl ChainCodec for RealChainCodec {
    fn header_hash(&self, header_bytes: &[u8]) -> Result<HexHash, DecodeError> {
        Ok(keccak_hex(header_bytes))
    }

    fn transaction_hash(&self, tx_bytes: &[u8]) -> Result<HexHash, DecodeError> {
        Ok(keccak_hex(tx_bytes))
    }

    fn recover_sender(&self, tx_bytes: &[u8]) -> Result<Address, DecodeError> {
        reject_typed(tx_bytes)?;
        let tx = Rlp::new(tx_bytes);

        let v: u64 = tx.at(6).and_then(|r| r.as_val()).map_err(rlp_err("v"))?;
        let r: Vec<u8> = tx.at(7).and_then(|r| r.data().map(|d| d.to_vec())).map_err(rlp_err("r"))?;
        let s: Vec<u8> = tx.at(8).and_then(|r| r.data().map(|d| d.to_vec())).map_err(rlp_err("s"))?;

        let (rec_id, chain_id) = recovery_id_and_chain_id(v);
        let signing_bytes = signing_payload(&tx, chain_id)?;
        let signing_hash = Keccak256::digest(&signing_bytes);

        let mut sig_bytes = [0u8; 64];
        let r_pad = 32usize.saturating_sub(r.len());
        let s_pad = 32usize.saturating_sub(s.len());
        sig_bytes[r_pad..32].copy_from_slice(&r);
        sig_bytes[32 + s_pad..].copy_from_slice(&s);

        let recovery_id = RecoveryId::from_i32(rec_id as i32)
            .map_err(|e| DecodeError::MalformedFrame(format!("invalid recovery id: {e}")))?;
        let signature = RecoverableSignature::from_compact(&sig_bytes, recovery_id)
            .map_err(|e| DecodeError::MalformedFrame(format!("invalid signature: {e}")))?;
        let message = Message::from_digest_slice(&signing_hash)
            .map_err(|e| DecodeError::MalformedFrame(format!("invalid message digest: {e}")))?;

        let public_key = Secp256k1::new()
            .recover_ecdsa(&message, &signature)
            .map_err(|e| DecodeError::MalformedFrame(format!("signature recovery failed: {e}")))?;

        let uncompressed = public_key.serialize_uncompressed();
        let address = &Keccak256::digest(&uncompressed[1..])[12..];
        Ok(address_hex(address))
    }

    fn recipient(&self, tx_bytes: &[u8]) -> Result<Address, DecodeError> {
        reject_typed(tx_bytes)?;
        let tx = Rlp::new(tx_bytes);
        let to = tx.at(3).and_then(|r| r.data().map(|d| d.to_vec())).map_err(rlp_err("to"))?;
        Ok(address_hex(&to))
    }

    fn receipt_contract_and_topics(
        &self,
        receipt_bytes: &[u8],
    ) -> Result<(Address, Vec<HexHash>), DecodeError> {
        let receipt = Rlp::new(receipt_bytes);
        let logs = receipt.at(3).map_err(rlp_err("logs"))?;

        let mut contract = String::new();
        let mut topic0s = Vec::new();

        for i in 0..logs.item_count().map_err(rlp_err("log count"))? {
            let log = logs.at(i).map_err(rlp_err("log"))?;
            let address = log.at(0).and_then(|r| r.data().map(|d| d.to_vec())).map_err(rlp_err("log address"))?;
            if contract.is_empty() {
                contract = address_hex(&address);
            }

            let topics = log.at(1).map_err(rlp_err("log topics"))?;
            if topics.item_count().map_err(rlp_err("topic count"))? > 0 {
                let topic0 = topics.at(0).and_then(|r| r.data().map(|d| d.to_vec())).map_err(rlp_err("topic0"))?;
                topic0s.push(topic_hex(&topic0));
            }
        }

        Ok((contract, topic0s))
    }
}
