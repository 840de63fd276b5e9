//! Trie descent for peptide lookups

use crate::error::IndexError;
use crate::sequence::SequenceProvider;
use crate::store::NodeStore;
use crate::tree::node::{Node, NodeSlot, Payload};
use crate::types::ProteinMapping;

/// Walks a top-level node toward a peptide, loading stored children as needed
pub(crate) struct Lookup<'a, P: ?Sized, S: ?Sized> {
    pub sequences: &'a P,
    pub store: &'a mut S,
}

impl<'a, P, S> Lookup<'a, P, S>
where
    P: SequenceProvider + ?Sized,
    S: NodeStore + ?Sized,
{
    pub fn descend(&mut self, node: &Node, peptide: &[u8]) -> Result<ProteinMapping, IndexError> {
        if node.depth() >= peptide.len() {
            return self.all_mappings(node);
        }
        match node.payload() {
            Payload::Leaf(accessions) => self.confirm(accessions, peptide),
            Payload::Split { subtree, .. } => match subtree.get(&peptide[node.depth()]) {
                None => Ok(ProteinMapping::new()),
                Some(NodeSlot::Resident(child)) => self.descend(child, peptide),
                Some(NodeSlot::Stored(handle)) => {
                    let child = self.store.load(handle)?;
                    self.descend(&child, peptide)
                }
            },
        }
    }

    /// Every mapping at or below `node`, positions sorted and deduplicated
    fn all_mappings(&mut self, node: &Node) -> Result<ProteinMapping, IndexError> {
        let mut mappings = ProteinMapping::new();
        let mut pending: Vec<Node> = Vec::new();
        collect(node, &mut mappings, &mut pending, &mut *self.store)?;
        while let Some(loaded) = pending.pop() {
            collect(&loaded, &mut mappings, &mut pending, &mut *self.store)?;
        }

        for positions in mappings.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
        Ok(mappings)
    }

    /// Keep the seed positions where the whole peptide really occurs
    fn confirm(
        &mut self,
        accessions: &ProteinMapping,
        peptide: &[u8],
    ) -> Result<ProteinMapping, IndexError> {
        let mut confirmed = ProteinMapping::new();
        for (accession, positions) in accessions {
            let sequence = self.sequences.sequence(accession)?;
            let residues = sequence.as_bytes();
            let matches: Vec<_> = positions
                .iter()
                .copied()
                .filter(|&p| residues.get(p..p + peptide.len()) == Some(peptide))
                .collect();
            if !matches.is_empty() {
                confirmed.insert(accession.clone(), matches);
            }
        }
        Ok(confirmed)
    }
}

/// Merge the resident part of `node` into `mappings`, loading stored children into `pending`
fn collect<S>(
    node: &Node,
    mappings: &mut ProteinMapping,
    pending: &mut Vec<Node>,
    store: &mut S,
) -> Result<(), IndexError>
where
    S: NodeStore + ?Sized,
{
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        match node.payload() {
            Payload::Leaf(accessions) => merge(mappings, accessions),
            Payload::Split { subtree, termini } => {
                merge(mappings, termini);
                for slot in subtree.values() {
                    match slot {
                        NodeSlot::Resident(child) => stack.push(child),
                        NodeSlot::Stored(handle) => pending.push(store.load(handle)?),
                    }
                }
            }
        }
    }
    Ok(())
}

fn merge(mappings: &mut ProteinMapping, other: &ProteinMapping) {
    for (accession, positions) in other {
        mappings
            .entry(accession.clone())
            .or_default()
            .extend_from_slice(positions);
    }
}
