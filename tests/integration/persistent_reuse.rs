use peptree::store::persistence::StoreStatus;
use peptree::{
    BuildParameters, BuildStatus, IndexSettings, PersistentNodeStore, ProteinTreeIndex,
};
use std::fs;
use tempfile::TempDir;

use crate::support::proteins;

fn settings() -> IndexSettings {
    IndexSettings {
        cache_size_limit: 2,
        query_cache_size: 16,
        ..IndexSettings::default()
    }
}

#[test]
fn persistent_store_is_found_again_for_same_source() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("proteins.fasta");
    fs::write(&source, ">P1\nMKTAYIAK\n>P2\nTAYIAKQR\n").unwrap();
    let root = temp.path().join("stores");
    let sequences = proteins(&[("P1", "MKTAYIAK"), ("P2", "TAYIAKQR")]);

    let store = PersistentNodeStore::open(&root, &source).unwrap();
    assert_eq!(store.status(), &StoreStatus::Fresh);
    let mut index = ProteinTreeIndex::new(&sequences, store, settings());
    assert_eq!(
        index.build(BuildParameters::new(3, 1), None, None).unwrap(),
        BuildStatus::Completed
    );
    let built = index.query("AYIAK").unwrap();
    index.close().unwrap();

    let store = PersistentNodeStore::open(&root, &source).unwrap();
    assert_eq!(store.status(), &StoreStatus::Reusable);
    let mut index = ProteinTreeIndex::new(&sequences, store, settings());
    assert_eq!(
        index.build(BuildParameters::new(3, 1), None, None).unwrap(),
        BuildStatus::Reused
    );
    assert_eq!(index.query("AYIAK").unwrap(), built);
    assert_eq!(index.query("AYIAK").unwrap()["P2"], vec![1]);
    assert_eq!(index.protein_length("P2").unwrap(), Some(8));
    index.close().unwrap();
}

#[test]
fn changed_tag_size_reports_stale_store() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("store");
    let sequences = proteins(&[("P1", "MKTAYIAK")]);

    let mut index =
        ProteinTreeIndex::new(&sequences, PersistentNodeStore::open_dir(&dir).unwrap(), settings());
    index.build(BuildParameters::new(3, 1), None, None).unwrap();
    index.close().unwrap();

    let mut index =
        ProteinTreeIndex::new(&sequences, PersistentNodeStore::open_dir(&dir).unwrap(), settings());
    let err = index
        .build(BuildParameters::new(4, 1), None, None)
        .unwrap_err();
    assert!(err.stale_reason().is_some());

    index.delete_store().unwrap();
    let mut index =
        ProteinTreeIndex::new(&sequences, PersistentNodeStore::open_dir(&dir).unwrap(), settings());
    assert_eq!(
        index.build(BuildParameters::new(4, 1), None, None).unwrap(),
        BuildStatus::Completed
    );
    assert_eq!(index.query("TAYI").unwrap()["P1"], vec![2]);
}
