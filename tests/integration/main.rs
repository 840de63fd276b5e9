//! Integration tests for the protein tag-tree index

mod lookup_scenarios;
mod persistent_reuse;
mod properties;
mod support;
