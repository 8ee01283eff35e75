//! Error kinds shared across the pipeline (§7).
//!
//! Each stage wraps its own lower-level errors (an object-store client
//! error, a `sqlx::Error`, a websocket error) into one of these before it
//! crosses a crate boundary, the way the teacher codebase keeps one
//! `thiserror` enum per domain crate and reserves `anyhow` for `main`.

use thiserror::Error;

/// Upstream/downstream connectivity failure. Fatal to the pipeline when it
/// originates from the primary upstream subscription (§7).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream connection failed: {0}")]
    ConnectFailed(String),
    #[error("upstream subscription closed unexpectedly")]
    Closed,
    #[error("websocket error: {0}")]
    WebSocket(String),
}

/// Malformed frame or field. Non-fatal: the offending frame is logged and
/// dropped (§7).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("misaligned transactions/receipts: {transactions} transactions, {receipts} receipts")]
    Misaligned { transactions: usize, receipts: usize },
    #[error("node reported error: {0}")]
    NodeError(String),
}

/// Object store refused or timed out a publish (§4.2, §7).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("object store put failed: {0}")]
    PutFailed(String),
    #[error("object store get failed: {0}")]
    GetFailed(String),
    #[error("invalid content address returned by object store: {0}")]
    InvalidCid(#[from] CidError),
}

/// Database constraint violation or connectivity failure (§4.3, §7).
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// A subscriber's predicate set was malformed; reported only to that
/// subscriber (§7).
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),
    #[error("subscriber channel overflowed, block {block_number} dropped")]
    ChannelOverflow { block_number: u64 },
}

/// Archival-upstream failure during backfill (§4.6, §7).
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("archival upstream error: {0}")]
    ArchivalUpstream(String),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// A returned CID failed [`crate::cid::Cid::new`]'s shape validation.
#[derive(Debug, Clone, Copy, Error)]
pub enum CidError {
    #[error("CID has invalid length {0} (expected 46-64)")]
    InvalidLength(usize),
    #[error("CID contains non-printable characters")]
    NotPrintable,
}
