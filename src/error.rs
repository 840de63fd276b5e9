//! Error types for the index, its stores, and the command-line layer.

use crate::types::IndexState;
use std::fmt;
use thiserror::Error;

/// Why a persistent store cannot be reused as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The corruption flag was left set by an abnormal end
    Corrupted,
    /// The import never completed
    Incomplete,
    /// Schema version differs from the current one
    Version(Option<String>),
    /// Built with a different seed tag size
    TagSize { expected: usize, found: Option<usize> },
    /// Built with a different decoy accession suffix
    DecoySuffix {
        expected: Option<String>,
        found: Option<String>,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Corrupted => write!(f, "store is flagged as corrupted"),
            StaleReason::Incomplete => write!(f, "import was not completed"),
            StaleReason::Version(Some(found)) => write!(f, "schema version {} is obsolete", found),
            StaleReason::Version(None) => write!(f, "schema version is missing"),
            StaleReason::TagSize { expected, found } => match found {
                Some(found) => write!(f, "built with tag size {} instead of {}", found, expected),
                None => write!(f, "tag size is missing (expected {})", expected),
            },
            StaleReason::DecoySuffix { expected, found } => write!(
                f,
                "built with decoy suffix {:?} instead of {:?}",
                found, expected
            ),
        }
    }
}

/// Node store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Malformed node record at {location}: {reason}")]
    Decode { location: String, reason: String },

    #[error("Node key already written in this session: {0}")]
    DuplicateKey(String),

    #[error("Stale node store: {0}")]
    Stale(StaleReason),

    #[error("No node record for {0}")]
    MissingRecord(String),
}

impl StorageError {
    pub(crate) fn decode(location: impl fmt::Display, reason: impl fmt::Display) -> Self {
        StorageError::Decode {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Sequence provider errors
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("Unknown protein accession: {0}")]
    UnknownAccession(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse sequence database: {0}")]
    Parse(String),
}

/// Errors surfaced by the index API
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Peptide ({peptide}) should be at least of length {tag_size}")]
    PeptideTooShort { peptide: String, tag_size: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index is not ready for queries (state: {0})")]
    NotReady(IndexState),

    #[error("Protein {0} has a non-ASCII sequence")]
    InvalidSequence(String),

    #[error("Position {position} of {accession} lies beyond the protein end")]
    Inconsistent { accession: String, position: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),
}

impl IndexError {
    /// Configuration errors are caller mistakes and never worth retrying
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            IndexError::PeptideTooShort { .. } | IndexError::Config(_)
        )
    }

    /// The stale reason, when a persistent store refused to be reused
    pub fn stale_reason(&self) -> Option<&StaleReason> {
        match self {
            IndexError::Storage(StorageError::Stale(reason)) => Some(reason),
            _ => None,
        }
    }
}

/// Command-line and setup errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("{0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Sequence error: {0}")]
    SequenceError(#[from] SequenceError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}
