//! Structured logging setup.
//!
//! Every stage tags its spans with a `stage` field (§5's subsystem-tagging
//! convention) so a shared aggregator can separate `stream-consumer` noise
//! from `screener-server` noise without grepping message text.

use tracing_subscriber::{fmt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Handle kept alive for the life of the process; dropping it has no
/// special behavior, it just documents that logging was initialized.
pub struct StructuredLogger {
    _private: (),
}

/// Install the global `tracing` subscriber for this process.
///
/// Must be called at most once per process; a second call returns
/// [`TelemetryError::LoggingInit`].
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(service = %config.service_name, "structured logging initialized");
    Ok(StructuredLogger { _private: () })
}

/// Log a block-related event with the standard `block_number`/`block_hash`
/// fields every stage should attach.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $stage:expr, $msg:expr, $block_number:expr, $block_hash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            stage = $stage,
            block_number = $block_number,
            block_hash = %$block_hash,
            $($($field)*,)?
            $msg
        )
    };
}
