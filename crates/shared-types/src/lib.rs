//! Domain entities, predicate types, error kinds, wire shapes, and the
//! configuration surface shared by every stage of the Sync-Publish-Screen-
//! Serve pipeline.
//!
//! This crate is the single source of truth so `stream-consumer`,
//! `content-publisher`, `index-repository`, `cid-retriever`,
//! `screener-server`, and `gap-backfiller` never redefine the same wire
//! shape or error kind twice.

pub mod cid;
pub mod config;
pub mod entities;
pub mod errors;
pub mod filters;
pub mod ipc;

pub use cid::{
    Cid, CidBundle, PublishedCids, ReceiptCid, StateNodeCid, StorageNodeCid, TransactionCid, UncleCid,
};
pub use config::PipelineConfig;
pub use entities::{
    Address, BlockPayload, HexHash, ReceiptEntry, StateNodeEntry, StorageNodeEntry,
    TransactionEntry, UncleEntry,
};
pub use errors::{BackfillError, CidError, DecodeError, FilterError, IndexError, PublishError, TransportError};
pub use filters::{
    CategoryFilter, HeaderFields, ReceiptFields, StateFields, StorageFields, SubscriptionFilters,
    TxFields,
};
