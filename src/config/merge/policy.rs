//! Merge policy: defaults seeded into the builder before any source.

use crate::config::PeptreeConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder pre-filled with the scalar defaults, so a partial file or a lone
/// environment variable still produces a complete section.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = PeptreeConfig::default();
    Config::builder()
        .set_default("index.tag_size", defaults.index.tag_size as i64)?
        .set_default("index.max_node_size", defaults.index.max_node_size as i64)?
        .set_default("index.cache_size_limit", defaults.index.cache_size_limit as i64)?
        .set_default("index.query_cache_size", defaults.index.query_cache_size as i64)?
        .set_default("store.kind", "scratch")?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", defaults.logging.format)?
        .set_default("logging.output", defaults.logging.output)
}
