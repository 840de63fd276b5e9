//! Tag tree: trie nodes, the index that owns them, query descent, and walks.

pub mod decoy;
pub mod index;
pub mod node;
pub mod peptides;
pub(crate) mod query;
