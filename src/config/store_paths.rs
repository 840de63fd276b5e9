//! StoreConfig and path resolution for node stores.

use crate::config::xdg;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which node store backs the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Temporary file, removed when the index closes
    #[default]
    Scratch,
    /// Database kept next to other builds of the same source file
    Persistent,
}

/// Node store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Directory holding persistent stores; None means `$XDG_DATA_HOME/peptree/stores`
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory for scratch files; None means the system temp dir
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Directory under which persistent stores are created
    pub fn resolve_root(&self) -> Result<PathBuf, ApiError> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => xdg::store_root(),
        }
    }

    pub fn resolve_scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
