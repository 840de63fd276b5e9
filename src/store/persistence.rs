//! Persistent node store
//!
//! A sled database per source file, kept across runs. Nodes are keyed by their
//! path. The directory name carries the source file's modification time, so an
//! edited database file gets a fresh store.

use crate::error::{StaleReason, StorageError};
use crate::store::record::{persist_tree, NodeRecord};
use crate::store::{NodeStore, Preparation, StoreHandle};
use crate::tree::node::Node;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// Schema version written on completed imports
pub const STORE_VERSION: &str = "1.0.0";

const NODES_TREE: &str = "nodes";
const LENGTHS_TREE: &str = "lengths";
const PARAMETERS_TREE: &str = "parameters";

const INITIAL_SIZE: &str = "initialSize";
const IMPORT_COMPLETE: &str = "importComplete";
const CORRUPTED: &str = "corrupted";
const VERSION: &str = "version";
const DECOY_SUFFIX: &str = "decoySuffix";

const DIR_SEPARATOR: &str = "_cus_";

/// State of a store found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// Nothing has been written yet
    Fresh,
    /// A completed import with the current schema
    Reusable,
    Stale(StaleReason),
}

pub struct PersistentNodeStore {
    dir: PathBuf,
    db: sled::Db,
    nodes: sled::Tree,
    lengths: sled::Tree,
    parameters: sled::Tree,
    status: StoreStatus,
    /// Keys written in this session
    written: Mutex<HashSet<String>>,
}

/// Directory name of the store for `source`: `{file name}_cus_{mtime in ms}`
pub fn store_dir_name(source: &Path) -> Result<String, StorageError> {
    let file_name = source_file_name(source)?;
    let modified = fs::metadata(source)?.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        .as_millis();
    Ok(format!("{}{}{}", file_name, DIR_SEPARATOR, millis))
}

fn source_file_name(source: &Path) -> Result<String, StorageError> {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("No file name in {}", source.display()),
            ))
        })
}

/// Delete stores under `root` built from earlier versions of `source`.
///
/// Returns the number of directories removed.
pub fn remove_outdated(root: &Path, source: &Path) -> Result<usize, StorageError> {
    if !root.exists() {
        return Ok(0);
    }
    let current = store_dir_name(source)?;
    let prefix = format!("{}{}", source_file_name(source)?, DIR_SEPARATOR);

    let mut removed = 0;
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && name.starts_with(&prefix) && name != current {
            info!(store = %entry.path().display(), "Removing outdated node store");
            fs::remove_dir_all(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

impl PersistentNodeStore {
    /// Open or create the store for `source` under `root`
    pub fn open(root: &Path, source: &Path) -> Result<Self, StorageError> {
        let dir = root.join(store_dir_name(source)?);
        Self::open_dir(dir)
    }

    /// Open or create a store in an explicit directory
    pub fn open_dir(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        // Flushes are explicit. sled's background flusher can keep the file lock after drop.
        let db = sled::Config::new()
            .path(&dir)
            .flush_every_ms(None)
            .open()?;
        let nodes = db.open_tree(NODES_TREE)?;
        let lengths = db.open_tree(LENGTHS_TREE)?;
        let parameters = db.open_tree(PARAMETERS_TREE)?;

        let mut store = Self {
            dir,
            db,
            nodes,
            lengths,
            parameters,
            status: StoreStatus::Fresh,
            written: Mutex::new(HashSet::new()),
        };
        store.status = store.read_status()?;
        match &store.status {
            StoreStatus::Stale(reason) => {
                warn!(dir = %store.dir.display(), %reason, "Node store cannot be reused")
            }
            status => debug!(dir = %store.dir.display(), ?status, "Opened node store"),
        }
        Ok(store)
    }

    pub fn status(&self) -> &StoreStatus {
        &self.status
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn parameter(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .parameters
            .get(name)?
            .map(|value| String::from_utf8_lossy(&value).into_owned()))
    }

    fn set_parameter(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.parameters.insert(name, value.as_bytes())?;
        Ok(())
    }

    fn flag(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.parameter(name)?.as_deref() == Some("true"))
    }

    fn read_status(&self) -> Result<StoreStatus, StorageError> {
        if self.parameters.is_empty() && self.nodes.is_empty() {
            return Ok(StoreStatus::Fresh);
        }
        if self.flag(CORRUPTED)? {
            return Ok(StoreStatus::Stale(StaleReason::Corrupted));
        }
        if !self.flag(IMPORT_COMPLETE)? {
            return Ok(StoreStatus::Stale(StaleReason::Incomplete));
        }
        let version = self.parameter(VERSION)?;
        if version.as_deref() != Some(STORE_VERSION) {
            return Ok(StoreStatus::Stale(StaleReason::Version(version)));
        }
        Ok(StoreStatus::Reusable)
    }

    fn initial_size(&self) -> Result<Option<usize>, StorageError> {
        Ok(self
            .parameter(INITIAL_SIZE)?
            .and_then(|value| value.parse().ok()))
    }

    /// Top-level tags: the node keys exactly `tag_size` residues long
    fn stored_tags(&self, tag_size: usize) -> Result<Vec<(String, StoreHandle)>, StorageError> {
        let mut tags = Vec::new();
        for key in self.nodes.iter().keys() {
            let key = key?;
            if key.len() == tag_size {
                let tag = String::from_utf8(key.to_vec())
                    .map_err(|e| StorageError::decode("node key", e))?;
                tags.push((tag.clone(), StoreHandle::Key(tag)));
            }
        }
        Ok(tags)
    }

    /// Write one record. `replace` allows overwriting a key already written in this session.
    ///
    /// Safe to call from several threads at once.
    pub fn put_record(
        &self,
        path: &str,
        record: &NodeRecord,
        replace: bool,
    ) -> Result<StoreHandle, StorageError> {
        let bytes = record.encode()?;

        let mut written = self.written.lock();
        let first_write = written.insert(path.to_string());
        if !first_write && !replace {
            warn!(key = path, "Node key written twice");
            return Err(StorageError::DuplicateKey(path.to_string()));
        }
        if let Err(e) = self.nodes.insert(path.as_bytes(), bytes) {
            if first_write {
                written.remove(path);
            }
            return Err(e.into());
        }
        Ok(StoreHandle::Key(path.to_string()))
    }

    /// Whether `key` was written during this session
    pub fn is_written(&self, key: &str) -> bool {
        self.written.lock().contains(key)
    }

    /// Flag the store as corrupted, close it, and remove its directory
    pub fn delete(self) -> Result<(), StorageError> {
        self.set_parameter(CORRUPTED, "true")?;
        self.db.flush()?;

        let Self {
            dir,
            db,
            nodes,
            lengths,
            parameters,
            ..
        } = self;
        drop(nodes);
        drop(lengths);
        drop(parameters);
        drop(db);

        info!(dir = %dir.display(), "Deleting node store");
        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}

impl NodeStore for PersistentNodeStore {
    fn prepare(
        &mut self,
        tag_size: usize,
        decoy_suffix: Option<&str>,
    ) -> Result<Preparation, StorageError> {
        match self.status.clone() {
            StoreStatus::Reusable => {
                let found = self.initial_size()?;
                let found_suffix = self.parameter(DECOY_SUFFIX)?;
                let mismatch = if found != Some(tag_size) {
                    Some(StaleReason::TagSize {
                        expected: tag_size,
                        found,
                    })
                } else if found_suffix.as_deref() != decoy_suffix {
                    Some(StaleReason::DecoySuffix {
                        expected: decoy_suffix.map(str::to_string),
                        found: found_suffix,
                    })
                } else {
                    None
                };
                if let Some(reason) = mismatch {
                    warn!(dir = %self.dir.display(), %reason, "Node store cannot be reused");
                    self.status = StoreStatus::Stale(reason.clone());
                    return Err(StorageError::Stale(reason));
                }
                let tags = self.stored_tags(tag_size)?;
                info!(dir = %self.dir.display(), tags = tags.len(), "Reusing node store");
                Ok(Preparation::Reuse(tags))
            }
            StoreStatus::Fresh => {
                self.set_parameter(CORRUPTED, "true")?;
                self.set_parameter(IMPORT_COMPLETE, "false")?;
                self.set_parameter(INITIAL_SIZE, &tag_size.to_string())?;
                if let Some(suffix) = decoy_suffix {
                    self.set_parameter(DECOY_SUFFIX, suffix)?;
                }
                self.db.flush()?;
                self.status = StoreStatus::Stale(StaleReason::Incomplete);
                info!(dir = %self.dir.display(), tag_size, "Importing into new node store");
                Ok(Preparation::Import)
            }
            StoreStatus::Stale(reason) => Err(StorageError::Stale(reason)),
        }
    }

    fn save(&mut self, path: &str, node: &Node) -> Result<StoreHandle, StorageError> {
        persist_tree(node, path, &mut |key: &str, record: NodeRecord| {
            self.put_record(key, &record, false)
        })
    }

    fn update(
        &mut self,
        _handle: &StoreHandle,
        path: &str,
        node: &Node,
    ) -> Result<StoreHandle, StorageError> {
        persist_tree(node, path, &mut |key: &str, record: NodeRecord| {
            self.put_record(key, &record, key == path)
        })
    }

    fn load(&mut self, handle: &StoreHandle) -> Result<Node, StorageError> {
        let key = match handle {
            StoreHandle::Key(key) => key,
            StoreHandle::Offset(offset) => {
                return Err(StorageError::decode(
                    format!("@{}", offset),
                    "persistent store addresses nodes by key",
                ))
            }
        };
        let bytes = self
            .nodes
            .get(key.as_bytes())?
            .ok_or_else(|| StorageError::MissingRecord(key.clone()))?;
        Ok(NodeRecord::decode(&bytes, key)?.into_node())
    }

    fn record_length(&mut self, accession: &str, length: usize) -> Result<(), StorageError> {
        self.lengths
            .insert(accession.as_bytes(), (length as u64).to_le_bytes().to_vec())?;
        Ok(())
    }

    fn finish_import(&mut self) -> Result<(), StorageError> {
        self.set_parameter(VERSION, STORE_VERSION)?;
        self.set_parameter(IMPORT_COMPLETE, "true")?;
        self.set_parameter(CORRUPTED, "false")?;
        self.db.flush()?;
        self.status = StoreStatus::Reusable;
        info!(dir = %self.dir.display(), nodes = self.nodes.len(), "Node store import complete");
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn protein_length(&self, accession: &str) -> Result<Option<usize>, StorageError> {
        match self.lengths.get(accession.as_bytes())? {
            None => Ok(None),
            Some(bytes) => {
                let raw = <[u8; 8]>::try_from(&bytes[..])
                    .map_err(|_| StorageError::decode(accession, "length is not a u64"))?;
                Ok(Some(u64::from_le_bytes(raw) as usize))
            }
        }
    }

    fn close(self) -> Result<(), StorageError> {
        self.db.flush()?;
        debug!(dir = %self.dir.display(), "Closed node store");
        Ok(())
    }
}
