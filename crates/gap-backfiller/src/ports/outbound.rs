//! Outbound port: the archival upstream GAP re-requests missing blocks
//! from. Request/response, unlike SC's live subscription (§4.6).

use async_trait::async_trait;
use shared_types::errors::BackfillError;
use shared_types::ipc::UpstreamFrame;

#[async_trait]
pub trait ArchivalSource: Send + Sync {
    async fn fetch_block(&self, block_number: u64) -> Result<UpstreamFrame, BackfillError>;
}

pub mod fakes {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeArchivalSource {
        pub blocks: Mutex<BTreeMap<u64, UpstreamFrame>>,
    }

    impl FakeArchivalSource {
        pub fn with_blocks(blocks: Vec<UpstreamFrame>) -> Self {
            Self {
                blocks: Mutex::new(blocks.into_iter().map(|b| (b.block_number, b)).collect()),
            }
        }
    }

    #[async_trait]
    impl ArchivalSource for FakeArchivalSource {
        async fn fetch_block(&self, block_number: u64) -> Result<UpstreamFrame, BackfillError> {
            self.blocks
                .lock()
                .unwrap()
                .get(&block_number)
                .cloned()
                .ok_or_else(|| BackfillError::ArchivalUpstream(format!("no archival block {block_number}")))
        }
    }
}
