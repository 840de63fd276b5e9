//! Alphabetical walk over every branch end of the tree

use crate::error::IndexError;
use crate::store::{NodeStore, StoreHandle};
use crate::tree::node::{Node, NodeSlot, Payload};
use crate::types::ProteinMapping;
use std::borrow::Cow;

/// A node waiting to be visited
pub(crate) enum Branch<'a> {
    Borrowed(&'a Node),
    Owned(Node),
    Stored(Cow<'a, StoreHandle>),
}

/// Iterator over `(peptide, mapping)` pairs, one per branch end.
///
/// A leaf yields its path and accessions. A split node yields its path with
/// its termini, when it has any, before the peptides of its children.
/// Stored nodes are read as the walk reaches them and are not made resident.
pub struct Peptides<'a, S: ?Sized> {
    roots: std::vec::IntoIter<(String, Branch<'a>)>,
    pending: Vec<(String, Branch<'a>)>,
    store: &'a mut S,
}

impl<'a, S> Peptides<'a, S>
where
    S: NodeStore + ?Sized,
{
    /// `roots` must be sorted by tag
    pub(crate) fn new(roots: Vec<(String, Branch<'a>)>, store: &'a mut S) -> Self {
        Self {
            roots: roots.into_iter(),
            pending: Vec::new(),
            store,
        }
    }

    fn visit_borrowed(&mut self, path: String, node: &'a Node) -> Option<(String, ProteinMapping)> {
        match node.payload() {
            Payload::Leaf(accessions) => (!accessions.is_empty()).then(|| (path, accessions.clone())),
            Payload::Split { subtree, termini } => {
                for (residue, slot) in subtree.iter().rev() {
                    let branch = match slot {
                        NodeSlot::Resident(child) => Branch::Borrowed(child),
                        NodeSlot::Stored(handle) => Branch::Stored(Cow::Borrowed(handle)),
                    };
                    self.pending.push((child_path(&path, *residue), branch));
                }
                (!termini.is_empty()).then(|| (path, termini.clone()))
            }
        }
    }

    fn visit_owned(&mut self, path: String, node: Node) -> Option<(String, ProteinMapping)> {
        match node.into_payload() {
            Payload::Leaf(accessions) => (!accessions.is_empty()).then_some((path, accessions)),
            Payload::Split { subtree, termini } => {
                for (residue, slot) in subtree.into_iter().rev() {
                    let branch = match slot {
                        NodeSlot::Resident(child) => Branch::Owned(child),
                        NodeSlot::Stored(handle) => Branch::Stored(Cow::Owned(handle)),
                    };
                    self.pending.push((child_path(&path, residue), branch));
                }
                (!termini.is_empty()).then_some((path, termini))
            }
        }
    }
}

fn child_path(path: &str, residue: u8) -> String {
    let mut child = String::with_capacity(path.len() + 1);
    child.push_str(path);
    child.push(char::from(residue));
    child
}

impl<'a, S> Iterator for Peptides<'a, S>
where
    S: NodeStore + ?Sized,
{
    type Item = Result<(String, ProteinMapping), IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (path, branch) = match self.pending.pop() {
                Some(entry) => entry,
                None => self.roots.next()?,
            };
            let visited = match branch {
                Branch::Borrowed(node) => self.visit_borrowed(path, node),
                Branch::Owned(node) => self.visit_owned(path, node),
                Branch::Stored(handle) => match self.store.load(&handle) {
                    Ok(node) => self.visit_owned(path, node),
                    Err(e) => return Some(Err(e.into())),
                },
            };
            if let Some(entry) = visited {
                return Some(Ok(entry));
            }
        }
    }
}
