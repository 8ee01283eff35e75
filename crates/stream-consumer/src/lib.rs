//! Holds the upstream `vdb_stream` subscription and decodes raw frames into
//! [`shared_types::BlockPayload`]s for the rest of the pipeline (§4.1).
//!
//! Hexagonal layout: `domain` is pure decoding logic, `ports` are the two
//! seams (the subscription handle, the chain codec) adapters in
//! `node-runtime` implement, and `service` wires them into the actual
//! consumer loop.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::StreamConfig;
pub use ports::inbound::StreamConsumerApi;
pub use ports::outbound::{fakes, ChainCodec, UpstreamSubscription};
pub use service::StreamConsumer;
