//! Node records
//!
//! The serialized form of a node. A record holds either the node's accession
//! mappings or the handles of its children, which are always written before
//! their parent.

use crate::error::StorageError;
use crate::store::StoreHandle;
use crate::tree::node::{mapping_entries, Node, NodeSlot, Payload};
use crate::types::{Accession, Position, Residue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRecord {
    Accessions {
        depth: usize,
        accessions: Vec<(Accession, Vec<Position>)>,
    },
    Indices {
        depth: usize,
        children: Vec<(Residue, StoreHandle)>,
        termini: Vec<(Accession, Vec<Position>)>,
    },
}

impl NodeRecord {
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(self).map_err(|e| StorageError::decode("encode", e))
    }

    pub fn decode(bytes: &[u8], location: impl std::fmt::Display) -> Result<Self, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::decode(location, e))
    }

    /// Rebuild the node; children come back as stored handles
    pub fn into_node(self) -> Node {
        match self {
            NodeRecord::Accessions { depth, accessions } => {
                Node::leaf(depth, accessions.into_iter().collect())
            }
            NodeRecord::Indices {
                depth,
                children,
                termini,
            } => Node::split_node(
                depth,
                children
                    .into_iter()
                    .map(|(residue, handle)| (residue, NodeSlot::Stored(handle)))
                    .collect(),
                termini.into_iter().collect(),
            ),
        }
    }
}

/// Write `node` and its resident descendants through `write`, children first.
///
/// `write` receives each node's path and record and returns the handle it was
/// stored under. Returns the handle of `node` itself.
pub(crate) fn persist_tree<F>(
    node: &Node,
    path: &str,
    write: &mut F,
) -> Result<StoreHandle, StorageError>
where
    F: FnMut(&str, NodeRecord) -> Result<StoreHandle, StorageError>,
{
    let record = match node.payload() {
        Payload::Leaf(accessions) => NodeRecord::Accessions {
            depth: node.depth(),
            accessions: mapping_entries(accessions),
        },
        Payload::Split { subtree, termini } => {
            let mut children = Vec::with_capacity(subtree.len());
            for (&residue, slot) in subtree {
                let handle = match slot {
                    NodeSlot::Resident(child) => {
                        let mut child_path = String::with_capacity(path.len() + 1);
                        child_path.push_str(path);
                        child_path.push(char::from(residue));
                        persist_tree(child, &child_path, write)?
                    }
                    NodeSlot::Stored(handle) => handle.clone(),
                };
                children.push((residue, handle));
            }
            NodeRecord::Indices {
                depth: node.depth(),
                children,
                termini: mapping_entries(termini),
            }
        }
    };
    write(path, record)
}
