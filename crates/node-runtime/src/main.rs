use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use node_runtime::Mode;

/// Runs one slice of the Sync-Publish-Screen-Serve pipeline.
#[derive(Parser, Debug)]
#[command(name = "node-runtime", version)]
struct Cli {
    /// Path to the pipeline's TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Which stages to run.
    #[arg(long, value_enum, default_value = "full")]
    mode: Mode,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let telemetry_config = telemetry::TelemetryConfig::for_stage("node-runtime");
    let _guard = telemetry::init_telemetry(telemetry_config).context("initializing telemetry")?;

    let config = node_runtime::config::load(&cli.config)?;

    node_runtime::wiring::run(cli.mode, config).await
}
