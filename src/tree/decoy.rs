//! Reversed decoy proteins
//!
//! A decoy is the reversed sequence of its target, named by appending a suffix
//! to the target accession. Decoys are never indexed: a peptide occurs in a
//! decoy at `length - position - peptide length` exactly when the reversed
//! peptide occurs in the target at `position`.

use crate::error::{IndexError, SequenceError};
use crate::types::{Position, ProteinMapping};

pub fn is_decoy(accession: &str, suffix: &str) -> bool {
    !suffix.is_empty() && accession.ends_with(suffix)
}

pub fn reverse_peptide(peptide: &str) -> String {
    peptide.chars().rev().collect()
}

/// Map hits of a reversed peptide in target proteins onto their decoys.
///
/// `length_of` returns the length of a target protein.
pub fn decoy_hits<F>(
    target_hits: &ProteinMapping,
    peptide_len: usize,
    suffix: &str,
    mut length_of: F,
) -> Result<ProteinMapping, IndexError>
where
    F: FnMut(&str) -> Result<Option<usize>, IndexError>,
{
    let mut decoys = ProteinMapping::new();
    for (accession, positions) in target_hits {
        if is_decoy(accession, suffix) {
            continue;
        }
        let length = length_of(accession)?
            .ok_or_else(|| SequenceError::UnknownAccession(accession.clone()))?;
        let mut mirrored: Vec<Position> = positions
            .iter()
            .map(|&position| {
                length
                    .checked_sub(position + peptide_len)
                    .ok_or_else(|| IndexError::Inconsistent {
                        accession: accession.clone(),
                        position,
                    })
            })
            .collect::<Result<_, _>>()?;
        mirrored.reverse();
        decoys.insert(format!("{}{}", accession, suffix), mirrored);
    }
    Ok(decoys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_mirrored_and_ascending() {
        // Target MKTAYIAK holds TAY at 2; its decoy KAIYATKM holds YAT at 3
        let mut hits = ProteinMapping::new();
        hits.insert("P1".to_string(), vec![0, 2]);

        let decoys = decoy_hits(&hits, 3, "_REVERSED", |_| Ok(Some(8))).unwrap();
        assert_eq!(decoys.len(), 1);
        assert_eq!(decoys["P1_REVERSED"], vec![3, 5]);
    }

    #[test]
    fn test_missing_length_is_an_error() {
        let mut hits = ProteinMapping::new();
        hits.insert("P1".to_string(), vec![0]);
        let err = decoy_hits(&hits, 3, "_REVERSED", |_| Ok(None)).unwrap_err();
        assert!(matches!(
            err,
            IndexError::Sequence(SequenceError::UnknownAccession(ref a)) if a == "P1"
        ));
    }

    #[test]
    fn test_position_past_the_end_is_inconsistent() {
        let mut hits = ProteinMapping::new();
        hits.insert("P1".to_string(), vec![7]);
        let err = decoy_hits(&hits, 3, "_REVERSED", |_| Ok(Some(8))).unwrap_err();
        assert!(matches!(err, IndexError::Inconsistent { position: 7, .. }));
    }

    #[test]
    fn test_decoy_detection() {
        assert!(is_decoy("P1_REVERSED", "_REVERSED"));
        assert!(!is_decoy("P1", "_REVERSED"));
        assert!(!is_decoy("P1", ""));
        assert_eq!(reverse_peptide("TAYI"), "IYAT");
    }
}
