//! Wiring, configuration, and CLI entry point for the six-stage pipeline:
//! `stream-consumer` -> `content-publisher` -> `index-repository`, fanned
//! out through `screener-server`, kept complete by `gap-backfiller`.
//!
//! Every other crate in the workspace declares its outbound ports as
//! traits; this crate is the only one that implements them against real
//! infrastructure (`adapters`) and the only one that reads configuration
//! from outside the process (`config`).

pub mod adapters;
pub mod config;
pub mod mode;
pub mod wiring;

pub use mode::Mode;
