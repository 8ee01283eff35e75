#![deny(unsafe_code)]

//! Subscriber registry, live fan-out, and historical replay for the
//! `vulcanizedb_stream` subscription (§4.5).

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{filter_payload, payload_from_resolved};
pub use ports::inbound::{ScreenerServerApi, SubscriptionHandle};
pub use ports::outbound::ObjectStore;
pub use service::Screener;
