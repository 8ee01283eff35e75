//! Concrete adapters for the outbound ports every pipeline crate declares
//! but does not implement itself.

pub mod codec;
pub mod object_store;
pub mod rpc_server;
pub mod upstream;

pub use codec::RealChainCodec;
pub use object_store::IpfsObjectStore;
pub use rpc_server::{serve_ipc, serve_ws};
pub use upstream::{HttpArchivalSource, WsUpstreamSubscription};
