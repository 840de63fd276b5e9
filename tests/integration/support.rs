use peptree::{
    BuildParameters, BuildStatus, FileNodeStore, IndexSettings, InMemorySequences,
    PersistentNodeStore, ProteinMapping, ProteinTreeIndex,
};
use std::path::Path;
use tempfile::TempDir;

pub type ScratchIndex = ProteinTreeIndex<InMemorySequences, FileNodeStore>;
pub type PersistentIndex = ProteinTreeIndex<InMemorySequences, PersistentNodeStore>;

pub fn proteins(entries: &[(&str, &str)]) -> InMemorySequences {
    entries.iter().copied().collect()
}

/// Build a scratch-backed index, asserting the build completes
pub fn scratch_index(
    temp: &TempDir,
    sequences: InMemorySequences,
    settings: IndexSettings,
    params: BuildParameters,
) -> ScratchIndex {
    let store = FileNodeStore::in_dir(temp.path()).unwrap();
    let mut index = ProteinTreeIndex::new(sequences, store, settings);
    assert_eq!(index.build(params, None, None).unwrap(), BuildStatus::Completed);
    index
}

/// Open the sled store in `dir` and build or reuse the index in it
pub fn persistent_index(
    dir: &Path,
    sequences: InMemorySequences,
    settings: IndexSettings,
    params: BuildParameters,
) -> (PersistentIndex, BuildStatus) {
    let store = PersistentNodeStore::open_dir(dir).unwrap();
    let mut index = ProteinTreeIndex::new(sequences, store, settings);
    let status = index.build(params, None, None).unwrap();
    (index, status)
}

/// Every occurrence of `peptide`, found by scanning each sequence
pub fn brute_force(sequences: &[(String, String)], peptide: &str) -> ProteinMapping {
    let mut expected = ProteinMapping::new();
    for (accession, sequence) in sequences {
        let positions: Vec<usize> = (0..sequence.len())
            .filter(|&p| sequence[p..].starts_with(peptide))
            .collect();
        if !positions.is_empty() {
            expected.insert(accession.clone(), positions);
        }
    }
    expected
}
