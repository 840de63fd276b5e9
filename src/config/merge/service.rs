//! MergeService: orchestrates sources, applies merge policy, deserializes to PeptreeConfig.

use crate::config::merge::policy;
use crate::config::sources::{environment, file};
use crate::config::PeptreeConfig;
use config::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from the standard sources.
    /// Precedence: defaults (lowest) -> user config file -> environment (highest).
    pub fn load() -> Result<PeptreeConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = file::add_user_file(builder);
        let builder = environment::add_to_builder(builder, None);
        builder.build()?.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<PeptreeConfig, ConfigError> {
        Self::load_with_env(Some(path), None)
    }

    /// Load with an explicit environment instead of the process one.
    pub fn load_with_env(
        path: Option<&Path>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<PeptreeConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = match path {
            Some(path) => file::add_required(builder, path),
            None => builder,
        };
        let builder = environment::add_to_builder(builder, vars);
        builder.build()?.try_deserialize()
    }
}
