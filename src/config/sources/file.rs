//! TOML file source: an explicit file, or the optional user config file

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use std::path::Path;

/// Add an explicit config file; it must exist.
pub fn add_required(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path).format(FileFormat::Toml).required(true))
}

/// Add `$XDG_CONFIG_HOME/peptree/config.toml` when present.
pub fn add_user_file(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match xdg::config_file() {
        Some(path) => builder.add_source(File::from(path).format(FileFormat::Toml).required(false)),
        None => builder,
    }
}
