//! Transactional upserts of content addresses and searchable metadata into
//! Postgres: header, uncle, transaction, receipt, state-node and
//! storage-node rows, all inside one transaction per block (§4.3).
//!
//! Hexagonal layout: `domain` validates the payload before anything is
//! written, `ports::outbound` is the transactional-store seam (a Postgres
//! adapter in production, an in-memory fake in tests), `service` runs the
//! five-step upsert sequence.

pub mod domain;
pub mod ports;
pub mod service;

pub use ports::inbound::IndexRepositoryApi;
pub use ports::outbound::{FakeIndexStore, IndexStore, IndexTransaction, PgIndexStore};
pub use service::IndexRepository;
