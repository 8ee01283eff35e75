//! Structured logging and metrics shared by every pipeline stage.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::for_stage("stream-consumer");
//!     let _guard = init_telemetry(config).expect("telemetry init failed");
//!     // ... stage runs here, logging through `tracing` as usual
//! }
//! ```

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::StructuredLogger;
pub use metrics::{
    gather_text, register_metrics, MetricsHandle, ACTIVE_SUBSCRIBERS, BLOCKS_INDEXED,
    BLOCKS_PUBLISHED, BLOCKS_SYNCED, CAP_PUBLISH_FAILURES, GAPS_BACKFILLED, GAPS_DETECTED,
    IDX_TRANSACTION_ROLLBACKS, RET_QUERIES, SC_DECODE_ERRORS, SRV_DROPPED_DELIVERIES,
};

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("failed to initialize metrics: {0}")]
    MetricsInit(String),

    #[error("invalid telemetry configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics for this process. Call exactly once,
/// near the top of `main`.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let logger = logging::init_logging(&config)?;

    Ok(TelemetryGuard {
        _logger: logger,
        _metrics: metrics_handle,
    })
}

/// Keeps telemetry state alive for the life of the process. Dropping it
/// performs no special shutdown; it just documents ownership.
pub struct TelemetryGuard {
    _logger: StructuredLogger,
    _metrics: MetricsHandle,
}

/// Span every stage should open at its top level, tagging all of its logs
/// with which stage produced them (§5).
#[macro_export]
macro_rules! stage_span {
    ($stage:expr) => {
        tracing::info_span!("stage", stage = $stage)
    };
}
