//! Configuration types for the schema catalog and entity builder

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CeramicError, Result};

/// Main configuration for a [`Ceramic`](crate::Ceramic) instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CeramicConfig {
    /// Schema catalog configuration
    pub catalog: CatalogConfig,

    /// Validation configuration
    pub validation: ValidationConfig,
}

/// Schema catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Maximum nesting of dynamic loads triggered from inside a loader
    pub max_resolution_depth: usize,

    /// Consult the dynamic loader on catalog misses
    pub dynamic_loading: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 32,
            dynamic_loading: true,
        }
    }
}

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Default for [`BuildOptions::validate`](crate::BuildOptions)
    pub validate_on_construct: bool,
}

impl CeramicConfig {
    /// Parse configuration from a `YAML` string
    ///
    /// # Errors
    ///
    /// Returns a parse error if the document is malformed, or a configuration
    /// error if the values are out of range.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a `JSON` string
    ///
    /// # Errors
    ///
    /// Returns a parse error if the document is malformed, or a configuration
    /// error if the values are out of range.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a `.yaml`, `.yml` or `.json` file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unknown extension,
    /// or does not parse.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(CeramicError::config(format!(
                "unsupported configuration file: {}",
                path.display()
            ))),
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_resolution_depth` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.max_resolution_depth == 0 {
            return Err(CeramicError::config(
                "catalog.max_resolution_depth must be at least 1",
            ));
        }
        Ok(())
    }
}
