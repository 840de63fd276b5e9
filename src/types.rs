//! Core types for the protein tag-tree index.

use std::collections::BTreeMap;
use std::fmt;

/// Accession: opaque protein identifier
pub type Accession = String;

/// Position: 0-based offset into a protein sequence where a node path begins
pub type Position = usize;

/// Tag: fixed-length seed substring keying a top-level node
pub type Tag = String;

/// Residue: a single sequence character (sequences are ASCII)
pub type Residue = u8;

/// Accession -> strictly increasing positions
pub type ProteinMapping = BTreeMap<Accession, Vec<Position>>;

/// Lifecycle of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Never built
    Empty,
    /// A build is running, or failed before completing
    Building,
    /// Built or attached to a reusable store; queries are allowed
    Ready,
    /// The last build was cancelled; the index must be discarded
    Cancelled,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IndexState::Empty => "empty",
            IndexState::Building => "building",
            IndexState::Ready => "ready",
            IndexState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
