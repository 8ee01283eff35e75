pub mod domain;
pub mod ports;
pub mod service;

pub use domain::block_numbers_in_range;
pub use ports::inbound::GapBackfillerApi;
pub use ports::outbound::{fakes, ArchivalSource};
pub use service::GapBackfiller;
