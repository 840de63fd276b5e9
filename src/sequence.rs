//! Sequence providers
//!
//! The index never owns sequence data: it stores positions and asks a
//! [`SequenceProvider`] for the residues whenever it needs to split a node or
//! confirm a match.

use crate::error::SequenceError;
use crate::types::Accession;
use bio::io::fasta;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Source of protein sequences
pub trait SequenceProvider {
    /// Full sequence of a protein
    fn sequence(&self, accession: &str) -> Result<Arc<str>, SequenceError>;

    /// Every known accession, in a stable order
    fn accessions(&self) -> Vec<Accession>;
}

impl<T: SequenceProvider + ?Sized> SequenceProvider for &T {
    fn sequence(&self, accession: &str) -> Result<Arc<str>, SequenceError> {
        (**self).sequence(accession)
    }

    fn accessions(&self) -> Vec<Accession> {
        (**self).accessions()
    }
}

/// Map-backed provider keeping insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemorySequences {
    order: Vec<Accession>,
    sequences: HashMap<Accession, Arc<str>>,
}

impl InMemorySequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a protein. A replaced protein keeps its original rank.
    pub fn insert(&mut self, accession: impl Into<Accession>, sequence: impl AsRef<str>) {
        let accession = accession.into();
        let sequence: Arc<str> = Arc::from(sequence.as_ref());
        if self.sequences.insert(accession.clone(), sequence).is_none() {
            self.order.push(accession);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<A, S> FromIterator<(A, S)> for InMemorySequences
where
    A: Into<Accession>,
    S: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (A, S)>>(iter: I) -> Self {
        let mut sequences = InMemorySequences::new();
        for (accession, sequence) in iter {
            sequences.insert(accession, sequence);
        }
        sequences
    }
}

impl SequenceProvider for InMemorySequences {
    fn sequence(&self, accession: &str) -> Result<Arc<str>, SequenceError> {
        self.sequences
            .get(accession)
            .cloned()
            .ok_or_else(|| SequenceError::UnknownAccession(accession.to_string()))
    }

    fn accessions(&self) -> Vec<Accession> {
        self.order.clone()
    }
}

/// Proteins loaded from a FASTA file
///
/// Residues are upper-cased on load. The source path is kept so that a
/// persistent node store can be matched to the file it was built from.
#[derive(Debug, Clone)]
pub struct FastaSequences {
    source: PathBuf,
    sequences: InMemorySequences,
}

impl FastaSequences {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SequenceError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = fasta::Reader::new(file);

        let mut sequences = InMemorySequences::new();
        for record in reader.records() {
            let record = record?;
            record
                .check()
                .map_err(|e| SequenceError::Parse(format!("{}: {}", record.id(), e)))?;
            let residues = std::str::from_utf8(record.seq()).map_err(|e| {
                SequenceError::Parse(format!("{}: sequence is not UTF-8: {}", record.id(), e))
            })?;
            if record.seq().is_empty() {
                debug!(accession = record.id(), "Skipping empty protein sequence");
                continue;
            }
            sequences.insert(record.id(), residues.to_ascii_uppercase());
        }

        info!(
            path = %path.display(),
            proteins = sequences.len(),
            "Loaded protein sequences"
        );

        Ok(Self {
            source: path.to_path_buf(),
            sequences,
        })
    }

    /// Path of the FASTA file these sequences came from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

impl SequenceProvider for FastaSequences {
    fn sequence(&self, accession: &str) -> Result<Arc<str>, SequenceError> {
        self.sequences.sequence(accession)
    }

    fn accessions(&self) -> Vec<Accession> {
        self.sequences.accessions()
    }
}
