use peptree::{
    BuildParameters, BuildStatus, IndexSettings, InMemorySequences, NodeStore, ProteinMapping,
    ProteinTreeIndex,
};
use proptest::prelude::*;
use tempfile::TempDir;

use crate::support::{brute_force, persistent_index, scratch_index, ScratchIndex};

const TAG_SIZE: usize = 3;

fn protein_set() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec("[ACDKR]{1,30}", 1..6).prop_map(|sequences| {
        sequences
            .into_iter()
            .enumerate()
            .map(|(i, sequence)| (format!("P{}", i + 1), sequence))
            .collect()
    })
}

fn peptide_set() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[ACDKR]{3,7}", 1..12)
}

/// Random peptides plus every 3- to 5-residue window of the first protein
fn peptides_for(proteins: &[(String, String)], random: &[String]) -> Vec<String> {
    let mut peptides = random.to_vec();
    let first = &proteins[0].1;
    for len in TAG_SIZE..=5 {
        for start in 0..first.len().saturating_sub(len - 1) {
            peptides.push(first[start..start + len].to_string());
        }
    }
    peptides
}

fn settings(cache_size_limit: u64) -> IndexSettings {
    IndexSettings {
        cache_size_limit,
        query_cache_size: 0,
        ..IndexSettings::default()
    }
}

fn build(
    temp: &TempDir,
    proteins: &[(String, String)],
    cache_size_limit: u64,
    max_node_size: usize,
) -> ScratchIndex {
    let sequences: InMemorySequences = proteins.iter().cloned().collect();
    scratch_index(
        temp,
        sequences,
        settings(cache_size_limit),
        BuildParameters::new(TAG_SIZE, max_node_size),
    )
}

fn answers<S: NodeStore>(
    index: &mut ProteinTreeIndex<InMemorySequences, S>,
    peptides: &[String],
) -> Vec<ProteinMapping> {
    peptides
        .iter()
        .map(|peptide| index.query(peptide).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    #[test]
    fn prop_query_matches_brute_force(proteins in protein_set(), random in peptide_set()) {
        let temp = TempDir::new().unwrap();
        let mut index = build(&temp, &proteins, 4, 2);
        for peptide in peptides_for(&proteins, &random) {
            let result = index.query(&peptide).unwrap();
            prop_assert_eq!(result, brute_force(&proteins, &peptide), "peptide {}", peptide);
        }
    }

    #[test]
    fn prop_positions_strictly_increase(proteins in protein_set(), random in peptide_set()) {
        let temp = TempDir::new().unwrap();
        let mut index = build(&temp, &proteins, 1_000_000, 1);
        for peptide in peptides_for(&proteins, &random) {
            for positions in index.query(&peptide).unwrap().values() {
                prop_assert!(!positions.is_empty());
                prop_assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
            }
        }
    }

    #[test]
    fn prop_split_threshold_does_not_change_results(
        proteins in protein_set(),
        random in peptide_set(),
    ) {
        let peptides = peptides_for(&proteins, &random);
        let temp = TempDir::new().unwrap();
        let split_everything = answers(&mut build(&temp, &proteins, 1_000_000, 1), &peptides);
        let never_split = answers(&mut build(&temp, &proteins, 1_000_000, usize::MAX), &peptides);
        prop_assert_eq!(split_everything, never_split);
    }

    #[test]
    fn prop_cache_limit_does_not_change_results(
        proteins in protein_set(),
        random in peptide_set(),
    ) {
        let peptides = peptides_for(&proteins, &random);
        let temp = TempDir::new().unwrap();
        let spilling = answers(&mut build(&temp, &proteins, 0, 2), &peptides);
        let resident = answers(&mut build(&temp, &proteins, 1_000_000, 2), &peptides);
        prop_assert_eq!(spilling, resident);
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 16, ..ProptestConfig::default() })]

    #[test]
    fn prop_persistent_query_matches_brute_force(
        proteins in protein_set(),
        random in peptide_set(),
    ) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("store");
        let sequences: InMemorySequences = proteins.iter().cloned().collect();
        let params = BuildParameters::new(TAG_SIZE, 2);
        let peptides = peptides_for(&proteins, &random);

        let (mut index, status) = persistent_index(&dir, sequences.clone(), settings(4), params);
        prop_assert_eq!(status, BuildStatus::Completed);
        for peptide in &peptides {
            let result = index.query(peptide).unwrap();
            prop_assert_eq!(result, brute_force(&proteins, peptide), "peptide {}", peptide);
        }
        index.close().unwrap();

        let (mut index, status) = persistent_index(&dir, sequences, settings(4), params);
        prop_assert_eq!(status, BuildStatus::Reused);
        for peptide in &peptides {
            let result = index.query(peptide).unwrap();
            prop_assert_eq!(result, brute_force(&proteins, peptide), "reused, peptide {}", peptide);
        }
        index.close().unwrap();
    }

    #[test]
    fn prop_persistent_cache_limit_does_not_change_results(
        proteins in protein_set(),
        random in peptide_set(),
    ) {
        let peptides = peptides_for(&proteins, &random);
        let temp = TempDir::new().unwrap();
        let sequences: InMemorySequences = proteins.iter().cloned().collect();
        let params = BuildParameters::new(TAG_SIZE, 2);

        let (mut spilling, _) =
            persistent_index(&temp.path().join("spill"), sequences.clone(), settings(0), params);
        let (mut resident, _) =
            persistent_index(&temp.path().join("resident"), sequences, settings(1_000_000), params);
        prop_assert_eq!(answers(&mut spilling, &peptides), answers(&mut resident, &peptides));
        spilling.close().unwrap();
        resident.close().unwrap();
    }
}
