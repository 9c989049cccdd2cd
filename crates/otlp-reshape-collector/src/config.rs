//! Configuration file for the reshaping collector.

use std::path::Path;

use otlp_reshape_core::{AccumulatorConfig, AggregatorConfig};
use serde::Deserialize;

use crate::Error;

/// Top-level collector configuration, read from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub aggregator: AggregatorConfig,
    pub accumulator: AccumulatorConfig,
}

impl CollectorConfig {
    /// Reads and validates a configuration file.
    pub fn from_path(path: &Path) -> Result<CollectorConfig, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::FileError {
            path: path.to_path_buf(),
            source,
        })?;
        CollectorConfig::from_yaml(&contents)
    }

    /// Parses and validates a configuration document.
    pub fn from_yaml(contents: &str) -> Result<CollectorConfig, Error> {
        let config: CollectorConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.aggregator.validate()?;
        self.accumulator.validate()?;
        Ok(())
    }
}
