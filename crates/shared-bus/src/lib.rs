//! Concurrency primitives shared across pipeline stages: the single quit
//! signal every stage selects on, and the non-blocking fan-out registry
//! `screener-server` builds its subscriber table on.

pub mod fanout;
pub mod quit;

pub use fanout::{FanoutRegistry, SubscriberId};
pub use quit::{QuitSignal, QuitWatch};

/// Recommended bound for any channel carrying one item per block (§4.1):
/// enough slack to absorb a slow consumer without the producer blocking
/// under ordinary conditions.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 20_000;
