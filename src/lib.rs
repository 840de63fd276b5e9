//! Peptree: Protein Tag-Tree Index
//!
//! Maps peptide subsequences to every protein accession, and every position within
//! that protein, where the subsequence occurs. Construction is memory-bounded: nodes
//! that do not fit in the resident budget are spilled to a node store and reloaded
//! on demand.

pub mod cleavage;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod sequence;
pub mod store;
pub mod tree;
pub mod types;

pub use cleavage::{CleavageRule, Enzyme};
pub use error::{IndexError, SequenceError, StorageError};
pub use progress::{ProgressCounter, ProgressSink};
pub use sequence::{FastaSequences, InMemorySequences, SequenceProvider};
pub use store::persistence::PersistentNodeStore;
pub use store::scratch::FileNodeStore;
pub use store::{NodeStore, StoreHandle};
pub use tree::index::{BuildParameters, BuildStatus, IndexSettings, ProteinTreeIndex};
pub use tree::peptides::Peptides;
pub use types::{IndexState, ProteinMapping};
