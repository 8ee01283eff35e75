//! Outbound ports: the upstream subscription handle and the chain-specific
//! codec SC uses to derive `src`/`dst`/`contract`/`topic0s` (§6). Concrete
//! adapters (a real websocket client, a real RLP/ECDSA codec) live in
//! `node-runtime`; this crate only depends on the trait.

use async_trait::async_trait;
use shared_types::{Address, DecodeError, HexHash, TransportError};
use shared_types::ipc::UpstreamFrame;

/// One upstream `vdb_stream` subscription. SC owns exactly one of these for
/// its whole lifetime (§3: "SC exclusively owns the upstream subscription
/// handle").
#[async_trait]
pub trait UpstreamSubscription: Send {
    /// Block until the next frame arrives. `Ok(None)` is the subscription's
    /// one-shot error channel closing — a non-error terminal condition SC
    /// must tolerate, not a [`TransportError`] (§4.1).
    async fn next_frame(&mut self) -> Result<Option<UpstreamFrame>, TransportError>;

    /// Unsubscribe from the upstream node. Called once, on `quit`.
    async fn unsubscribe(&mut self);
}

/// Chain-specific decoding SC needs but does not implement itself: recovering
/// a transaction's signer, reading its recipient, and extracting a receipt's
/// emitting address and log topics (§6: "Derived-field computation rules").
pub trait ChainCodec: Send + Sync {
    fn header_hash(&self, header_bytes: &[u8]) -> Result<HexHash, DecodeError>;
    fn transaction_hash(&self, tx_bytes: &[u8]) -> Result<HexHash, DecodeError>;
    /// Signer address recovered from the transaction's signature and chain id.
    fn recover_sender(&self, tx_bytes: &[u8]) -> Result<Address, DecodeError>;
    /// `to` address, or empty for contract creation.
    fn recipient(&self, tx_bytes: &[u8]) -> Result<Address, DecodeError>;
    /// `(contract, topic0s)` for a receipt: the emitting address of its first
    /// log (or empty), and the first topic of every log in order (empty, not
    /// null, when there are no logs).
    fn receipt_contract_and_topics(
        &self,
        receipt_bytes: &[u8],
    ) -> Result<(Address, Vec<HexHash>), DecodeError>;
}

pub mod fakes {
    use super::*;

    /// Deterministic stand-in for a real RLP/ECDSA codec, used by unit
    /// tests in this crate. A log is present iff the receipt bytes contain
    /// the marker byte `0xAA`.
    pub struct FakeCodec;

    impl ChainCodec for FakeCodec {
        fn header_hash(&self, header_bytes: &[u8]) -> Result<HexHash, DecodeError> {
            Ok(format!("0x{}", hex::encode(header_bytes)))
        }

        fn transaction_hash(&self, tx_bytes: &[u8]) -> Result<HexHash, DecodeError> {
            Ok(format!("0x{}", hex::encode(tx_bytes)))
        }

        fn recover_sender(&self, _tx_bytes: &[u8]) -> Result<Address, DecodeError> {
            Ok("0xsender".to_string())
        }

        fn recipient(&self, tx_bytes: &[u8]) -> Result<Address, DecodeError> {
            if tx_bytes.first() == Some(&0) {
                Ok(String::new())
            } else {
                Ok("0xdst".to_string())
            }
        }

        fn receipt_contract_and_topics(
            &self,
            receipt_bytes: &[u8],
        ) -> Result<(Address, Vec<HexHash>), DecodeError> {
            if receipt_bytes.contains(&0xAA) {
                Ok(("0x1111".to_string(), vec!["0xaaaa".to_string()]))
            } else {
                Ok((String::new(), Vec::new()))
            }
        }
    }

    pub struct FakeUpstream {
        pub frames: std::collections::VecDeque<UpstreamFrame>,
        pub unsubscribed: bool,
    }

    impl FakeUpstream {
        pub fn new(frames: Vec<UpstreamFrame>) -> Self {
            Self {
                frames: frames.into(),
                unsubscribed: false,
            }
        }
    }

    #[async_trait]
    impl UpstreamSubscription for FakeUpstream {
        async fn next_frame(&mut self) -> Result<Option<UpstreamFrame>, TransportError> {
            Ok(self.frames.pop_front())
        }

        async fn unsubscribe(&mut self) {
            self.unsubscribed = true;
        }
    }
}
