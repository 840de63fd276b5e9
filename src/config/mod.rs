//! Configuration
//!
//! `PeptreeConfig` is assembled from serde defaults, an optional TOML file, and
//! `PEPTREE__*` environment variables, in increasing order of precedence.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod store_paths;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use store_paths::{StoreConfig, StoreKind};

use crate::cleavage::Enzyme;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::tree::index::{BuildParameters, IndexSettings};
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeptreeConfig {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Cleavage rule applied while seeding; none indexes every start
    #[serde(default)]
    pub enzyme: Option<Enzyme>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tree shape and memory limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_tag_size")]
    pub tag_size: usize,

    /// Accessions a node may hold before it is split
    #[serde(default = "default_max_node_size")]
    pub max_node_size: usize,

    /// Depth below which nodes are never split
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Resident accession entries before nodes are spilled to the store
    #[serde(default = "default_cache_size_limit")]
    pub cache_size_limit: u64,

    #[serde(default = "default_query_cache_size")]
    pub query_cache_size: usize,

    /// Accession suffix of reversed decoys, e.g. `_REVERSED`
    #[serde(default)]
    pub decoy_suffix: Option<String>,
}

fn default_tag_size() -> usize {
    3
}

fn default_max_node_size() -> usize {
    500
}

fn default_cache_size_limit() -> u64 {
    1_000_000
}

fn default_query_cache_size() -> usize {
    1000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            tag_size: default_tag_size(),
            max_node_size: default_max_node_size(),
            max_depth: None,
            cache_size_limit: default_cache_size_limit(),
            query_cache_size: default_query_cache_size(),
            decoy_suffix: None,
        }
    }
}

impl IndexConfig {
    pub fn settings(&self) -> IndexSettings {
        IndexSettings {
            cache_size_limit: self.cache_size_limit,
            query_cache_size: self.query_cache_size,
            decoy_suffix: self.decoy_suffix.clone(),
        }
    }

    pub fn parameters(&self) -> BuildParameters {
        BuildParameters {
            tag_size: self.tag_size,
            max_node_size: self.max_node_size,
            max_depth: self.max_depth,
        }
    }
}

impl PeptreeConfig {
    /// Reject values the index cannot work with
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.index.tag_size == 0 {
            return Err(ApiError::ConfigError(
                "index.tag_size must be at least 1".to_string(),
            ));
        }
        if self.index.max_node_size == 0 {
            return Err(ApiError::ConfigError(
                "index.max_node_size must be at least 1".to_string(),
            ));
        }
        if self.index.decoy_suffix.as_deref() == Some("") {
            return Err(ApiError::ConfigError(
                "index.decoy_suffix must not be empty".to_string(),
            ));
        }
        if let Some(enzyme) = &self.enzyme {
            if enzyme.cleave_after.is_empty() && enzyme.cleave_before.is_empty() {
                return Err(ApiError::ConfigError(format!(
                    "Enzyme {} cleaves nowhere",
                    enzyme.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PeptreeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index.tag_size, 3);
        assert_eq!(config.index.settings().query_cache_size, 1000);
        assert_eq!(config.store.kind, StoreKind::Scratch);
        assert!(config.enzyme.is_none());
    }

    #[test]
    fn test_zero_tag_size_rejected() {
        let mut config = PeptreeConfig::default();
        config.index.tag_size = 0;
        assert!(matches!(config.validate(), Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn test_decoy_suffix_reaches_settings() {
        let mut config = PeptreeConfig::default();
        config.index.decoy_suffix = Some("_REVERSED".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.index.settings().decoy_suffix.as_deref(),
            Some("_REVERSED")
        );

        config.index.decoy_suffix = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enzyme_without_sites_rejected() {
        let mut config = PeptreeConfig::default();
        config.enzyme = Some(Enzyme {
            name: "blunt".to_string(),
            cleave_after: String::new(),
            restriction_after: String::new(),
            cleave_before: String::new(),
            restriction_before: String::new(),
        });
        assert!(config.validate().is_err());
    }
}
