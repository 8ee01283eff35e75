//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for structured logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line (identifies which stage
    /// emitted it: `stream-consumer`, `content-publisher`, ...).
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error), or a full
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_level: String,

    /// Whether to emit JSON-formatted logs instead of human-readable ones.
    pub json_logs: bool,

    /// Prometheus metrics port. `0` disables the exporter.
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "vulcanize-pipeline".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_port: 9100,
        }
    }
}

impl TelemetryConfig {
    /// Build configuration from environment variables, falling back to
    /// [`TelemetryConfig::default`] for anything unset.
    ///
    /// - `VDB_SERVICE_NAME`
    /// - `VDB_LOG_LEVEL` or `RUST_LOG`
    /// - `VDB_JSON_LOGS`
    /// - `VDB_METRICS_PORT`
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("VDB_SERVICE_NAME")
                .unwrap_or_else(|_| "vulcanize-pipeline".to_string()),

            log_level: env::var("VDB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("VDB_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_port: env::var("VDB_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9100),
        }
    }

    /// Configuration for one named stage, e.g. `for_stage("stream-consumer")`.
    pub fn for_stage(stage: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("vulcanize-{stage}");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "vulcanize-pipeline");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.metrics_port, 9100);
    }

    #[test]
    fn for_stage_sets_service_name() {
        let config = TelemetryConfig::for_stage("stream-consumer");
        assert_eq!(config.service_name, "vulcanize-stream-consumer");
    }
}
