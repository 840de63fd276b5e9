//! Trie node types and node splitting

use crate::error::IndexError;
use crate::sequence::SequenceProvider;
use crate::store::StoreHandle;
use crate::types::{Accession, Position, ProteinMapping, Residue};
use std::collections::BTreeMap;
use tracing::warn;

/// Trie node
///
/// `depth` is the number of residues consumed from the root, so every
/// top-level node starts at the tag size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    depth: usize,
    payload: Payload,
}

/// Node contents: either accession mappings or children keyed by the next residue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Leaf(ProteinMapping),
    Split {
        subtree: BTreeMap<Residue, NodeSlot>,
        /// Positions whose path ended at exactly this depth when the node was split
        termini: ProteinMapping,
    },
}

/// A child that is either held in memory or written to the node store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSlot {
    Resident(Node),
    Stored(StoreHandle),
}

impl Node {
    /// Empty leaf at `depth`
    pub fn new(depth: usize) -> Self {
        Self::leaf(depth, ProteinMapping::new())
    }

    pub fn leaf(depth: usize, accessions: ProteinMapping) -> Self {
        Self {
            depth,
            payload: Payload::Leaf(accessions),
        }
    }

    pub fn split_node(
        depth: usize,
        subtree: BTreeMap<Residue, NodeSlot>,
        termini: ProteinMapping,
    ) -> Self {
        Self {
            depth,
            payload: Payload::Split { subtree, termini },
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn is_split(&self) -> bool {
        matches!(self.payload, Payload::Split { .. })
    }

    /// Record the positions of `accession` in this leaf, replacing any earlier entry.
    ///
    /// Returns true when the accession was not present before.
    pub fn add_accession(&mut self, accession: &str, positions: Vec<Position>) -> bool {
        match &mut self.payload {
            Payload::Leaf(accessions) => accessions
                .insert(accession.to_string(), positions)
                .is_none(),
            Payload::Split { .. } => {
                warn!(
                    accession,
                    depth = self.depth,
                    "Ignoring accession added to a split node"
                );
                debug_assert!(false, "add_accession on a split node");
                false
            }
        }
    }

    /// Number of accession entries held in memory by this node and its resident children
    pub fn size(&self) -> usize {
        match &self.payload {
            Payload::Leaf(accessions) => accessions.len(),
            Payload::Split { subtree, termini } => {
                termini.len()
                    + subtree
                        .values()
                        .map(|slot| match slot {
                            NodeSlot::Resident(child) => child.size(),
                            NodeSlot::Stored(_) => 0,
                        })
                        .sum::<usize>()
            }
        }
    }

    /// Turn an oversized leaf into children keyed by the residue following its path.
    ///
    /// Returns false and leaves the node untouched when it is already split, holds at
    /// most `max_node_size` accessions, or sits at `max_depth`.
    pub fn split<P>(
        &mut self,
        max_node_size: usize,
        max_depth: Option<usize>,
        sequences: &P,
    ) -> Result<bool, IndexError>
    where
        P: SequenceProvider + ?Sized,
    {
        let accessions = match &self.payload {
            Payload::Leaf(accessions) => accessions,
            Payload::Split { .. } => return Ok(false),
        };
        if accessions.len() <= max_node_size || max_depth.is_some_and(|max| self.depth >= max) {
            return Ok(false);
        }

        let mut groups: BTreeMap<Residue, ProteinMapping> = BTreeMap::new();
        let mut termini = ProteinMapping::new();
        for (accession, positions) in accessions {
            let sequence = sequences.sequence(accession)?;
            let residues = sequence.as_bytes();
            for &position in positions {
                let offset = position + self.depth;
                let target = match residues.get(offset) {
                    Some(&residue) => groups.entry(residue).or_default(),
                    None if offset == residues.len() => &mut termini,
                    None => {
                        return Err(IndexError::Inconsistent {
                            accession: accession.clone(),
                            position,
                        })
                    }
                };
                target.entry(accession.clone()).or_default().push(position);
            }
        }

        let subtree = groups
            .into_iter()
            .map(|(residue, group)| {
                let mut child = Node::new(self.depth + 1);
                for (accession, positions) in group {
                    child.add_accession(&accession, positions);
                }
                (residue, NodeSlot::Resident(child))
            })
            .collect();
        self.payload = Payload::Split { subtree, termini };
        Ok(true)
    }

    /// Accessions of a leaf, if this is one
    pub fn accessions(&self) -> Option<&ProteinMapping> {
        match &self.payload {
            Payload::Leaf(accessions) => Some(accessions),
            Payload::Split { .. } => None,
        }
    }

    pub fn child(&self, residue: Residue) -> Option<&NodeSlot> {
        match &self.payload {
            Payload::Leaf(_) => None,
            Payload::Split { subtree, .. } => subtree.get(&residue),
        }
    }
}

/// Split a node and, recursively, every resident child created by the split.
///
/// Returns true when anything changed.
pub fn split_subtree<P>(
    root: &mut Node,
    max_node_size: usize,
    max_depth: Option<usize>,
    sequences: &P,
) -> Result<bool, IndexError>
where
    P: SequenceProvider + ?Sized,
{
    let mut changed = false;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        changed |= node.split(max_node_size, max_depth, sequences)?;
        if let Payload::Split { subtree, .. } = &mut node.payload {
            for slot in subtree.values_mut() {
                if let NodeSlot::Resident(child) = slot {
                    stack.push(child);
                }
            }
        }
    }
    Ok(changed)
}

/// Leaf entries in a stable order, for record encoding
pub(crate) fn mapping_entries(mapping: &ProteinMapping) -> Vec<(Accession, Vec<Position>)> {
    mapping
        .iter()
        .map(|(accession, positions)| (accession.clone(), positions.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::InMemorySequences;

    fn sequences() -> InMemorySequences {
        [("P1", "MKTAYIAK"), ("P2", "TAYIAKQR"), ("P3", "QTAY")]
            .into_iter()
            .collect()
    }

    fn tay_leaf() -> Node {
        let mut node = Node::new(3);
        node.add_accession("P1", vec![2]);
        node.add_accession("P2", vec![0]);
        node.add_accession("P3", vec![1]);
        node
    }

    #[test]
    fn test_add_accession_replaces_entry() {
        let mut node = Node::new(3);
        assert!(node.add_accession("P1", vec![1]));
        assert!(!node.add_accession("P1", vec![4, 9]));
        assert_eq!(node.size(), 1);
        assert_eq!(node.accessions().unwrap()["P1"], vec![4, 9]);
    }

    #[test]
    fn test_split_groups_by_next_residue() {
        let mut node = tay_leaf();
        assert!(node.split(1, None, &sequences()).unwrap());
        assert!(node.is_split());

        let Some(NodeSlot::Resident(child)) = node.child(b'I') else {
            panic!("expected resident child for I");
        };
        assert_eq!(child.depth(), 4);
        assert_eq!(child.accessions().unwrap()["P1"], vec![2]);
        assert_eq!(child.accessions().unwrap()["P2"], vec![0]);

        let Payload::Split { termini, .. } = node.payload() else {
            panic!("expected split payload");
        };
        assert_eq!(termini["P3"], vec![1]);
        assert_eq!(node.size(), 3);
    }

    #[test]
    fn test_split_noop_conditions() {
        let sequences = sequences();

        let mut small = tay_leaf();
        assert!(!small.split(3, None, &sequences).unwrap());

        let mut deep = tay_leaf();
        assert!(!deep.split(1, Some(3), &sequences).unwrap());

        let mut split = tay_leaf();
        assert!(split.split(1, None, &sequences).unwrap());
        assert!(!split.split(1, None, &sequences).unwrap());
    }

    #[test]
    fn test_split_position_beyond_end_is_error() {
        let mut node = Node::new(3);
        node.add_accession("P3", vec![3]);
        node.add_accession("P1", vec![2]);
        let err = node.split(1, None, &sequences()).unwrap_err();
        assert!(matches!(err, IndexError::Inconsistent { ref accession, position: 3 } if accession == "P3"));
    }

    #[test]
    fn test_split_subtree_descends_until_small() {
        let mut node = tay_leaf();
        assert!(split_subtree(&mut node, 1, None, &sequences()).unwrap());

        // TAY -> I -> A -> K still holds P1 and P2 together until P1 runs out
        let mut current = &node;
        for residue in [b'I', b'A', b'K'] {
            match current.child(residue) {
                Some(NodeSlot::Resident(child)) => current = child,
                other => panic!("missing child {}: {:?}", residue as char, other),
            }
        }
        assert_eq!(current.depth(), 6);
        let Payload::Split { subtree, termini } = current.payload() else {
            panic!("expected TAYIAK to be split");
        };
        assert_eq!(termini["P1"], vec![2]);
        assert!(subtree.contains_key(&b'Q'));
    }
}
