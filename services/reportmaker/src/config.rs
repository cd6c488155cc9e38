//! Configuration file loading.
//!
//! One optional YAML file configures every subcommand. Environment
//! variables override imagery settings after the file is read.

use std::path::Path;

use anyhow::{Context, Result};
use imagery::ImageryConfig;
use serde::Deserialize;
use symbology::RenderOptions;
use tracing::{debug, info};

/// Root of the YAML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub imagery: ImageryConfig,
    pub render: RenderOptions,
}

impl ReportConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ReportConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded report config");
        Ok(config)
    }

    /// Load `path` if given, else defaults, then apply environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Using config file");
                Self::load(path)?
            }
            None => Self::default(),
        };
        config.imagery = config
            .imagery
            .with_env_overrides()
            .context("Invalid imagery environment override")?;
        Ok(config)
    }
}
