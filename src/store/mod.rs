//! Node Store
//!
//! Holds trie nodes that do not fit in the resident budget. Two interchangeable
//! implementations exist: an append-only scratch file addressed by byte offset,
//! and a persistent database addressed by node path that survives across runs.

pub mod persistence;
pub mod record;
pub mod scratch;

use crate::error::StorageError;
use crate::tree::node::Node;
use crate::types::Tag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a stored node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreHandle {
    /// Byte offset of the record in a scratch file
    Offset(u64),
    /// Path of the node in a persistent store
    Key(String),
}

impl fmt::Display for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreHandle::Offset(offset) => write!(f, "@{}", offset),
            StoreHandle::Key(key) => write!(f, "{}", key),
        }
    }
}

/// What a build should do with the store it was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preparation {
    /// Scan every protein and populate the store
    Import,
    /// The store already holds a complete index with these top-level tags
    Reuse(Vec<(Tag, StoreHandle)>),
}

/// Node store interface
///
/// `path` is the residue string leading from the root to the node; the top-level
/// path is the tag itself. Resident children are written along with their parent
/// and come back from [`load`](NodeStore::load) as stored handles.
pub trait NodeStore {
    /// Called once at the start of every build.
    ///
    /// `decoy_suffix` marks decoy accessions that the build leaves out of the tree.
    fn prepare(
        &mut self,
        _tag_size: usize,
        _decoy_suffix: Option<&str>,
    ) -> Result<Preparation, StorageError> {
        Ok(Preparation::Import)
    }

    /// Write a node that has never been stored
    fn save(&mut self, path: &str, node: &Node) -> Result<StoreHandle, StorageError>;

    /// Write a new version of a stored node, returning the handle to use from now on
    fn update(
        &mut self,
        handle: &StoreHandle,
        path: &str,
        node: &Node,
    ) -> Result<StoreHandle, StorageError>;

    fn load(&mut self, handle: &StoreHandle) -> Result<Node, StorageError>;

    /// Remember the length of a scanned protein
    fn record_length(&mut self, _accession: &str, _length: usize) -> Result<(), StorageError> {
        Ok(())
    }

    /// Mark a completed build
    fn finish_import(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Durable stores keep every node after the build so the index can be reused
    fn is_durable(&self) -> bool {
        false
    }

    fn protein_length(&self, _accession: &str) -> Result<Option<usize>, StorageError> {
        Ok(None)
    }

    fn close(self) -> Result<(), StorageError>
    where
        Self: Sized;
}
