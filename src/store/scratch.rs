//! Scratch node store
//!
//! Append-only temporary file, deleted when the store is closed or dropped.
//! Each record is a `>` marker, a little-endian `u32` body length, and the
//! bincode-encoded [`NodeRecord`]. A record is addressed by the offset of its
//! marker.

use crate::error::StorageError;
use crate::store::record::{persist_tree, NodeRecord};
use crate::store::{NodeStore, StoreHandle};
use crate::tree::node::Node;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

const RECORD_MARKER: u8 = b'>';
const HEADER_LEN: u64 = 5;

pub struct FileNodeStore {
    file: NamedTempFile,
    end: u64,
}

impl FileNodeStore {
    /// Create a store in the system temporary directory
    pub fn new() -> Result<Self, StorageError> {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file = tempfile::Builder::new()
            .prefix("peptree-")
            .suffix(".nodes")
            .tempfile_in(dir)?;
        debug!(path = %file.path().display(), "Opened scratch node store");
        Ok(Self { file, end: 0 })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Bytes written so far
    pub fn len(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    fn append(&mut self, record: &NodeRecord) -> Result<StoreHandle, StorageError> {
        let offset = self.end;
        let body = record.encode()?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| StorageError::decode(format!("@{}", offset), "record too large"))?;

        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&[RECORD_MARKER])?;
        file.write_all(&body_len.to_le_bytes())?;
        file.write_all(&body)?;

        self.end = offset + HEADER_LEN + u64::from(body_len);
        Ok(StoreHandle::Offset(offset))
    }

    fn write_tree(&mut self, path: &str, node: &Node) -> Result<StoreHandle, StorageError> {
        persist_tree(node, path, &mut |_: &str, record: NodeRecord| self.append(&record))
    }

    fn read_record(&mut self, offset: u64) -> Result<NodeRecord, StorageError> {
        let location = format!("@{}", offset);
        if offset + HEADER_LEN > self.end {
            return Err(StorageError::decode(location, "offset past end of file"));
        }

        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if header[0] != RECORD_MARKER {
            return Err(StorageError::decode(location, "missing record marker"));
        }

        let body_len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
        if offset + HEADER_LEN + u64::from(body_len) > self.end {
            return Err(StorageError::decode(location, "truncated record body"));
        }
        let mut body = vec![0u8; body_len as usize];
        file.read_exact(&mut body)?;
        NodeRecord::decode(&body, location)
    }
}

impl NodeStore for FileNodeStore {
    fn save(&mut self, path: &str, node: &Node) -> Result<StoreHandle, StorageError> {
        self.write_tree(path, node)
    }

    fn update(
        &mut self,
        _handle: &StoreHandle,
        path: &str,
        node: &Node,
    ) -> Result<StoreHandle, StorageError> {
        self.write_tree(path, node)
    }

    fn load(&mut self, handle: &StoreHandle) -> Result<Node, StorageError> {
        match handle {
            StoreHandle::Offset(offset) => Ok(self.read_record(*offset)?.into_node()),
            StoreHandle::Key(key) => Err(StorageError::decode(
                key,
                "scratch store addresses nodes by offset",
            )),
        }
    }

    fn close(self) -> Result<(), StorageError> {
        debug!(path = %self.file.path().display(), bytes = self.end, "Deleting scratch node store");
        self.file.close()?;
        Ok(())
    }
}
