//! Compiles a subscriber's predicate set into the read queries that resolve
//! one block's content addresses, one query per enabled category (§4.4).
//!
//! Hexagonal layout: `domain` holds the address-to-state-key projection,
//! `ports::outbound` is the read-only store seam, `service` is the
//! predicate-to-query compiler plus gap-detection queries `gap-backfiller`
//! drives.

pub mod domain;
pub mod ports;
pub mod service;

pub use ports::inbound::CidRetrieverApi;
pub use ports::outbound::{fakes, PgRetrieverStore, RetrieverStore, TransactionRow};
pub use service::CidRetriever;
