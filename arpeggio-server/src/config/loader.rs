//! Configuration loader

use std::path::Path;

use arpeggio_utils::{ArpeggioError, Result};

use super::AppConfig;
use crate::sequence::SequenceSpec;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| ArpeggioError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(|e| ArpeggioError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        for (name, spec) in &config.services {
            if spec.cmd.split_whitespace().next().is_none() {
                return Err(ArpeggioError::config(format!(
                    "service {}: empty command line",
                    name
                )));
            }
        }

        // Every sequence must compile into a spec
        for (name, sequence) in &config.sequences {
            SequenceSpec::from_config(name, sequence)?;
        }

        Ok(())
    }

    /// Load and validate
    pub fn load_and_validate(path: &Path) -> Result<AppConfig> {
        let config = Self::load_from_path(path)?;
        Self::validate(&config)?;
        Ok(config)
    }
}
