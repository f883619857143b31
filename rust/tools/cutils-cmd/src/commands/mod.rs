//! Command implementations for cutils-cmd

use anyhow::{Context, Result};
use cutils_workflow::PoolConfig;

use crate::utils::validate_file_exists;

pub mod config;
pub mod run;

/// Loads a `PoolConfig` from a JSON file, or returns the defaults when no
/// path is given. The loaded configuration is validated.
pub fn load_pool_config(path: Option<&str>) -> Result<PoolConfig> {
    let config = match path {
        Some(path) => {
            validate_file_exists(path)?;
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read pool config: {path}"))?;
            serde_json::from_str::<PoolConfig>(&text)
                .with_context(|| format!("Invalid pool config JSON: {path}"))?
        }
        None => PoolConfig::default(),
    };
    config
        .validate()
        .with_context(|| "Pool configuration rejected")?;
    Ok(config)
}
