//! Cleavage rules
//!
//! When a rule is supplied to a build, only peptide N-termini that follow a
//! cleavage site (or start the protein) are indexed.

use crate::types::Residue;
use serde::{Deserialize, Serialize};

/// Decides whether a protein is cut between two residues
pub trait CleavageRule {
    fn is_cleavage_site(&self, before: Residue, after: Residue) -> bool;
}

/// Enzyme described by the residues it cuts after or before
///
/// Trypsin example: cuts after K or R, unless the next residue is P.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enzyme {
    pub name: String,

    /// Residues after which the enzyme cuts
    #[serde(default)]
    pub cleave_after: String,

    /// Residues that prevent a cut after `cleave_after` when they follow it
    #[serde(default)]
    pub restriction_after: String,

    /// Residues before which the enzyme cuts
    #[serde(default)]
    pub cleave_before: String,

    /// Residues that prevent a cut before `cleave_before` when they precede it
    #[serde(default)]
    pub restriction_before: String,
}

impl Enzyme {
    pub fn trypsin() -> Self {
        Self {
            name: "Trypsin".to_string(),
            cleave_after: "KR".to_string(),
            restriction_after: "P".to_string(),
            cleave_before: String::new(),
            restriction_before: String::new(),
        }
    }

    pub fn lys_c() -> Self {
        Self {
            name: "Lys-C".to_string(),
            cleave_after: "K".to_string(),
            restriction_after: String::new(),
            cleave_before: String::new(),
            restriction_before: String::new(),
        }
    }

    pub fn asp_n() -> Self {
        Self {
            name: "Asp-N".to_string(),
            cleave_after: String::new(),
            restriction_after: String::new(),
            cleave_before: "D".to_string(),
            restriction_before: String::new(),
        }
    }

    /// Look up a preset by case-insensitive name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trypsin" => Some(Self::trypsin()),
            "lys-c" | "lysc" => Some(Self::lys_c()),
            "asp-n" | "aspn" => Some(Self::asp_n()),
            _ => None,
        }
    }
}

fn contains(residues: &str, residue: Residue) -> bool {
    residues.as_bytes().contains(&residue)
}

impl CleavageRule for Enzyme {
    fn is_cleavage_site(&self, before: Residue, after: Residue) -> bool {
        if contains(&self.cleave_after, before) && !contains(&self.restriction_after, after) {
            return true;
        }
        contains(&self.cleave_before, after) && !contains(&self.restriction_before, before)
    }
}
