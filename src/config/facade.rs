//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::PeptreeConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from an explicit file, or from the user config file, then environment.
    pub fn load(config_file: Option<&Path>) -> Result<PeptreeConfig, ConfigError> {
        match config_file {
            Some(path) => MergeService::load_from_file(path),
            None => MergeService::load(),
        }
    }
}
