//! Environment variable source: PEPTREE prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;
use std::collections::HashMap;

/// Environment variable prefix
pub const PREFIX: &str = "PEPTREE";

/// Add environment variable overlay to builder.
///
/// Uses the PEPTREE prefix and __ as separator for nested keys, so
/// `PEPTREE__INDEX__TAG_SIZE=4` sets `index.tag_size`. `vars` replaces the
/// process environment when given.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    vars: Option<HashMap<String, String>>,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(vars),
    )
}
