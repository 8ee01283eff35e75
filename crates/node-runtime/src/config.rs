//! Loads the recognized configuration surface (§6) from a TOML file with
//! `VDB_` environment-variable overrides, the way
//! `chainflip-engine`'s settings loader layers a file under env vars.

use anyhow::Context;
use shared_types::config::PipelineConfig;
use std::path::Path;

pub fn load(path: &Path) -> anyhow::Result<PipelineConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("VDB").separator("__"))
        .build()
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    settings
        .try_deserialize()
        .context("configuration did not match the recognized pipeline schema")
}
