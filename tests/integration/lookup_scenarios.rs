use peptree::{
    BuildParameters, BuildStatus, Enzyme, FileNodeStore, IndexError, IndexSettings, IndexState,
    ProgressCounter, ProteinTreeIndex,
};
use std::sync::Arc;
use tempfile::TempDir;

use crate::support::{proteins, scratch_index};

#[test]
fn two_proteins_share_tag_positions() {
    let temp = TempDir::new().unwrap();
    let mut index = scratch_index(
        &temp,
        proteins(&[("P1", "MKTAYIAK"), ("P2", "TAYIAKQR")]),
        IndexSettings::default(),
        BuildParameters::new(3, 500),
    );

    let tay = index.query("TAY").unwrap();
    assert_eq!(tay.len(), 2);
    assert_eq!(tay["P1"], vec![2]);
    assert_eq!(tay["P2"], vec![0]);

    let ayi = index.query("AYI").unwrap();
    assert_eq!(ayi["P1"], vec![3]);
    assert_eq!(ayi["P2"], vec![1]);

    assert!(matches!(
        index.query("TA"),
        Err(IndexError::PeptideTooShort { tag_size: 3, .. })
    ));
    assert!(index.query("ZZZ").unwrap().is_empty());
    index.close().unwrap();
}

#[test]
fn longer_peptides_are_confirmed_exactly() {
    let temp = TempDir::new().unwrap();
    let mut index = scratch_index(
        &temp,
        proteins(&[("P1", "MKTAYIAKTAYL"), ("P2", "TAYIAKQR"), ("P3", "XTAYB")]),
        IndexSettings::default(),
        BuildParameters::new(3, 2),
    );

    let result = index.query("TAYIAK").unwrap();
    assert_eq!(result["P1"], vec![2]);
    assert_eq!(result["P2"], vec![0]);
    assert!(!result.contains_key("P3"));

    assert_eq!(index.query("TAY").unwrap()["P1"], vec![2, 8]);
    assert_eq!(index.query("TAYB").unwrap()["P3"], vec![1]);
    assert!(index.query("TAYD").unwrap().is_empty());
    assert!(index.query("KTAYIAKTAYLQ").unwrap().is_empty());
}

#[test]
fn peptide_at_protein_end_is_found() {
    let temp = TempDir::new().unwrap();
    let mut index = scratch_index(
        &temp,
        proteins(&[("P1", "MKTAY"), ("P2", "TAYIAK"), ("P3", "TAY")]),
        IndexSettings::default(),
        BuildParameters::new(3, 1),
    );

    let result = index.query("TAY").unwrap();
    assert_eq!(result["P1"], vec![2]);
    assert_eq!(result["P2"], vec![0]);
    assert_eq!(result["P3"], vec![0]);
    assert_eq!(index.query("IAK").unwrap()["P2"], vec![3]);
}

#[test]
fn cleavage_rule_limits_seed_positions() {
    let temp = TempDir::new().unwrap();
    let store = FileNodeStore::in_dir(temp.path()).unwrap();
    let mut index = ProteinTreeIndex::new(
        proteins(&[("P1", "MKTAYRPTAYK")]),
        store,
        IndexSettings::default(),
    );
    let trypsin = Enzyme::trypsin();
    index
        .build(BuildParameters::new(3, 500), Some(&trypsin), None)
        .unwrap();

    // TAY at 2 follows K; TAY at 7 follows P
    assert_eq!(index.query("TAY").unwrap()["P1"], vec![2]);
    assert_eq!(index.query("MKT").unwrap()["P1"], vec![0]);
    assert!(index.query("RPT").unwrap().is_empty());
}

#[test]
fn cancellation_from_another_handle_stops_build() {
    let temp = TempDir::new().unwrap();
    let store = FileNodeStore::in_dir(temp.path()).unwrap();
    let mut index = ProteinTreeIndex::new(
        proteins(&[("P1", "MKTAYIAK"), ("P2", "TAYIAKQR")]),
        store,
        IndexSettings::default(),
    );
    let progress = Arc::new(ProgressCounter::new("build"));
    progress.cancel();

    let status = index
        .build(BuildParameters::new(3, 500), None, Some(progress.as_ref()))
        .unwrap();
    assert_eq!(status, BuildStatus::Cancelled);
    assert_eq!(progress.done(), 0);
    assert!(matches!(
        index.query("TAY"),
        Err(IndexError::NotReady(IndexState::Cancelled))
    ));
}

#[test]
fn progress_reports_proteins_then_prefixes() {
    let temp = TempDir::new().unwrap();
    let store = FileNodeStore::in_dir(temp.path()).unwrap();
    let mut index = ProteinTreeIndex::new(
        proteins(&[("P1", "MKTAYIAK"), ("P2", "TAYIAKQR"), ("P3", "QQQ")]),
        store,
        IndexSettings::default(),
    );
    let progress = ProgressCounter::new("build");
    index
        .build(BuildParameters::new(3, 500), None, Some(&progress))
        .unwrap();

    // MK KT TA AY YI IA AK KQ QQ
    assert_eq!(progress.total(), 9);
    assert_eq!(progress.done(), 9);
}

#[test]
fn non_ascii_peptide_matches_nothing() {
    let temp = TempDir::new().unwrap();
    let mut index = scratch_index(
        &temp,
        proteins(&[("P1", "MKTAYIAK")]),
        IndexSettings::default(),
        BuildParameters::new(3, 500),
    );
    assert!(index.query("TAÝ").unwrap().is_empty());
    assert!(index.query("TÄ").unwrap_err().is_config());
}
