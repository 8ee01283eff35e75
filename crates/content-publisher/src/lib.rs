//! Turns a decoded [`shared_types::entities::BlockPayload`] into
//! content-addressed objects, one per header/uncle/transaction/receipt/state
//! node/storage node (§4.2).
//!
//! Hexagonal layout: `domain` holds the hash primitive, `ports::outbound` is
//! the object store seam `node-runtime` wires up, `service` publishes every
//! component of a block concurrently and aborts the whole block on the first
//! failure.

pub mod domain;
pub mod ports;
pub mod service;

pub use ports::inbound::ContentPublisherApi;
pub use ports::outbound::{InMemoryObjectStore, ObjectStore};
pub use service::ContentPublisher;
