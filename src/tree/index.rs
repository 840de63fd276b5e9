//! Protein Tree Index
//!
//! Owns the top-level map from seed tag to trie node. Building scans every
//! protein once, keeps the resident part of the tree under a size limit by
//! spilling the least recently used tags to the node store, then splits every
//! oversized node. Queries descend from the tag of the peptide and confirm
//! leaf hits against the real sequence.

use crate::cleavage::CleavageRule;
use crate::error::IndexError;
use crate::progress::{PrefixTable, ProgressSink};
use crate::sequence::SequenceProvider;
use crate::store::persistence::PersistentNodeStore;
use crate::store::{NodeStore, Preparation, StoreHandle};
use crate::tree::decoy::{decoy_hits, is_decoy, reverse_peptide};
use crate::tree::node::{split_subtree, Node};
use crate::tree::peptides::{Branch, Peptides};
use crate::tree::query::Lookup;
use crate::types::{IndexState, Position, ProteinMapping, Tag};
use lru::LruCache;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use tracing::{debug, info};

/// Limits that apply for the lifetime of an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    /// Resident accession entries allowed before tags are spilled to the store
    pub cache_size_limit: u64,
    /// Memoised query results; 0 disables the cache
    pub query_cache_size: usize,
    /// Accession suffix of reversed decoy proteins. Decoys are left out of the
    /// tree and answered from their target with the reversed peptide.
    pub decoy_suffix: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            cache_size_limit: 1_000_000,
            query_cache_size: 1000,
            decoy_suffix: None,
        }
    }
}

/// Shape of the tree produced by a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildParameters {
    pub tag_size: usize,
    pub max_node_size: usize,
    pub max_depth: Option<usize>,
}

impl BuildParameters {
    pub fn new(tag_size: usize, max_node_size: usize) -> Self {
        Self {
            tag_size,
            max_node_size,
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    fn validate(&self) -> Result<(), IndexError> {
        if self.tag_size == 0 {
            return Err(IndexError::Config("Tag size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// How a build ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// Every protein was scanned and every node split
    Completed,
    /// The store already held a complete index
    Reused,
    /// The progress sink asked to stop; the index is unusable
    Cancelled,
}

/// A top-level node held in memory
#[derive(Debug)]
struct ResidentNode {
    node: Node,
    /// Where the last written copy lives, if any
    handle: Option<StoreHandle>,
    /// Changed since it was last written
    dirty: bool,
}

#[derive(Debug)]
enum TagSlot {
    Resident(ResidentNode),
    Stored(StoreHandle),
}

pub struct ProteinTreeIndex<P, S> {
    sequences: P,
    store: S,
    settings: IndexSettings,
    params: Option<BuildParameters>,
    tree: HashMap<Tag, TagSlot>,
    /// Resident tags, least recently used first
    eviction_order: LruCache<Tag, ()>,
    resident_size: u64,
    query_cache: Option<LruCache<String, ProteinMapping>>,
    state: IndexState,
}

/// Seed positions of every tag in `sequence`, grouped by tag.
///
/// With a cleavage rule, only starts that open the protein or follow a cleavage site count.
pub fn seed_tags(
    sequence: &str,
    tag_size: usize,
    rule: Option<&dyn CleavageRule>,
) -> BTreeMap<Tag, Vec<Position>> {
    let residues = sequence.as_bytes();
    let mut seeds: BTreeMap<Tag, Vec<Position>> = BTreeMap::new();
    if tag_size == 0 || residues.len() < tag_size {
        return seeds;
    }
    for start in 0..=residues.len() - tag_size {
        let accepted = match rule {
            None => true,
            Some(_) if start == 0 => true,
            Some(rule) => rule.is_cleavage_site(residues[start - 1], residues[start]),
        };
        if accepted {
            seeds
                .entry(sequence[start..start + tag_size].to_string())
                .or_default()
                .push(start);
        }
    }
    seeds
}

impl<P, S> ProteinTreeIndex<P, S>
where
    P: SequenceProvider,
    S: NodeStore,
{
    pub fn new(sequences: P, store: S, settings: IndexSettings) -> Self {
        let query_cache = NonZeroUsize::new(settings.query_cache_size).map(LruCache::new);
        Self {
            sequences,
            store,
            settings,
            params: None,
            tree: HashMap::new(),
            eviction_order: LruCache::unbounded(),
            resident_size: 0,
            query_cache,
            state: IndexState::Empty,
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Tag size of the last build
    pub fn tag_size(&self) -> Option<usize> {
        self.params.map(|params| params.tag_size)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of top-level tags currently held in memory
    pub fn nodes_in_cache(&self) -> usize {
        self.eviction_order.len()
    }

    /// Number of distinct top-level tags
    pub fn tag_count(&self) -> usize {
        self.tree.len()
    }

    /// Resident accession entries, the measure compared against the cache limit
    pub fn resident_size(&self) -> u64 {
        self.resident_size
    }

    /// Build the index from every protein of the sequence provider
    pub fn build(
        &mut self,
        params: BuildParameters,
        rule: Option<&dyn CleavageRule>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<BuildStatus, IndexError> {
        params.validate()?;
        self.reset();
        self.params = Some(params);
        self.state = IndexState::Building;

        let prepared = self
            .store
            .prepare(params.tag_size, self.settings.decoy_suffix.as_deref())?;
        if let Preparation::Reuse(tags) = prepared {
            info!(tags = tags.len(), "Reusing stored index");
            self.tree = tags
                .into_iter()
                .map(|(tag, handle)| (tag, TagSlot::Stored(handle)))
                .collect();
            self.state = IndexState::Ready;
            return Ok(BuildStatus::Reused);
        }

        if !self.scan(&params, rule, progress)? || !self.split_all(&params, progress)? {
            info!("Index build cancelled");
            self.state = IndexState::Cancelled;
            return Ok(BuildStatus::Cancelled);
        }

        if self.store.is_durable() {
            self.persist_resident()?;
            self.store.finish_import()?;
        }

        info!(
            tags = self.tree.len(),
            resident = self.nodes_in_cache(),
            "Index build complete"
        );
        self.state = IndexState::Ready;
        Ok(BuildStatus::Completed)
    }

    fn reset(&mut self) {
        self.tree.clear();
        self.eviction_order.clear();
        self.resident_size = 0;
        self.empty_query_cache();
    }

    /// Populate the tree with seed positions. Returns false when cancelled.
    fn scan(
        &mut self,
        params: &BuildParameters,
        rule: Option<&dyn CleavageRule>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<bool, IndexError> {
        let accessions = self.sequences.accessions();
        info!(
            proteins = accessions.len(),
            tag_size = params.tag_size,
            "Scanning proteins"
        );
        if let Some(progress) = progress {
            progress.set_total(accessions.len() as u64);
        }

        for accession in accessions {
            if progress.is_some_and(|p| p.is_cancelled()) {
                return Ok(false);
            }

            let sequence = self.sequences.sequence(&accession)?;
            if !sequence.is_ascii() {
                return Err(IndexError::InvalidSequence(accession));
            }
            self.store.record_length(&accession, sequence.len())?;

            if !self.is_decoy(&accession) {
                for (tag, positions) in seed_tags(&sequence, params.tag_size, rule) {
                    self.add_to_tag(tag, &accession, positions)?;
                }
                self.evict_overflow()?;
            }

            if let Some(progress) = progress {
                progress.increment();
            }
        }
        Ok(true)
    }

    fn add_to_tag(
        &mut self,
        tag: Tag,
        accession: &str,
        positions: Vec<Position>,
    ) -> Result<(), IndexError> {
        if !self.make_resident(&tag)? {
            let depth = self.tag_size().unwrap_or(tag.len());
            self.tree.insert(
                tag.clone(),
                TagSlot::Resident(ResidentNode {
                    node: Node::new(depth),
                    handle: None,
                    dirty: true,
                }),
            );
            self.eviction_order.put(tag.clone(), ());
        }

        if let Some(TagSlot::Resident(resident)) = self.tree.get_mut(&tag) {
            if resident.node.add_accession(accession, positions) {
                self.resident_size += 1;
            }
            resident.dirty = true;
        }
        Ok(())
    }

    /// Split every tag. Returns false when cancelled.
    fn split_all(
        &mut self,
        params: &BuildParameters,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<bool, IndexError> {
        let mut tags: Vec<Tag> = self.tree.keys().cloned().collect();
        tags.sort_unstable();
        let mut prefixes = PrefixTable::from_tags(&tags);
        info!(
            tags = tags.len(),
            max_node_size = params.max_node_size,
            "Splitting nodes"
        );
        if let Some(progress) = progress {
            progress.set_total(prefixes.len() as u64);
        }

        for tag in &tags {
            if progress.is_some_and(|p| p.is_cancelled()) {
                return Ok(false);
            }
            self.split_tag(tag, params)?;
            prefixes.observe(tag, progress)?;
            self.evict_overflow()?;
        }
        Ok(true)
    }

    fn split_tag(&mut self, tag: &str, params: &BuildParameters) -> Result<(), IndexError> {
        let handle = match self.tree.get_mut(tag) {
            None => return Ok(()),
            Some(TagSlot::Resident(resident)) => {
                let before = resident.node.size() as u64;
                if split_subtree(
                    &mut resident.node,
                    params.max_node_size,
                    params.max_depth,
                    &self.sequences,
                )? {
                    resident.dirty = true;
                }
                self.resident_size = self.resident_size - before + resident.node.size() as u64;
                return Ok(());
            }
            Some(TagSlot::Stored(handle)) => handle.clone(),
        };

        let mut node = self.store.load(&handle)?;
        if split_subtree(
            &mut node,
            params.max_node_size,
            params.max_depth,
            &self.sequences,
        )? {
            let updated = self.store.update(&handle, tag, &node)?;
            self.tree.insert(tag.to_string(), TagSlot::Stored(updated));
        }
        Ok(())
    }

    /// Load a stored tag into memory and mark it most recently used.
    ///
    /// Returns false when the tag is unknown.
    fn make_resident(&mut self, tag: &str) -> Result<bool, IndexError> {
        let handle = match self.tree.get(tag) {
            None => return Ok(false),
            Some(TagSlot::Resident(_)) => {
                self.eviction_order.put(tag.to_string(), ());
                return Ok(true);
            }
            Some(TagSlot::Stored(handle)) => handle.clone(),
        };

        let node = self.store.load(&handle)?;
        debug!(tag, %handle, "Reloaded node from store");
        self.resident_size += node.size() as u64;
        self.tree.insert(
            tag.to_string(),
            TagSlot::Resident(ResidentNode {
                node,
                handle: Some(handle),
                dirty: false,
            }),
        );
        self.eviction_order.put(tag.to_string(), ());
        Ok(true)
    }

    /// Spill least recently used tags until the resident size is under the limit
    fn evict_overflow(&mut self) -> Result<(), IndexError> {
        let mut evicted = 0usize;
        while self.resident_size >= self.settings.cache_size_limit {
            let Some((tag, ())) = self.eviction_order.pop_lru() else {
                break;
            };
            self.evict(tag)?;
            evicted += 1;
        }
        if evicted > 0 {
            debug!(
                evicted,
                resident_size = self.resident_size,
                "Evicted nodes to store"
            );
        }
        Ok(())
    }

    fn evict(&mut self, tag: Tag) -> Result<(), IndexError> {
        let resident = match self.tree.remove(&tag) {
            Some(TagSlot::Resident(resident)) => resident,
            Some(stored) => {
                self.tree.insert(tag, stored);
                return Ok(());
            }
            None => return Ok(()),
        };
        self.resident_size = self
            .resident_size
            .saturating_sub(resident.node.size() as u64);
        let handle = self.write_back(&tag, resident)?;
        self.tree.insert(tag, TagSlot::Stored(handle));
        Ok(())
    }

    /// Write a resident node if it changed, returning the handle of its current copy
    fn write_back(&mut self, tag: &str, resident: ResidentNode) -> Result<StoreHandle, IndexError> {
        let handle = match resident.handle {
            Some(handle) if !resident.dirty => handle,
            Some(handle) => self.store.update(&handle, tag, &resident.node)?,
            None => self.store.save(tag, &resident.node)?,
        };
        Ok(handle)
    }

    /// Write every changed resident node, keeping it in memory
    fn persist_resident(&mut self) -> Result<(), IndexError> {
        let mut written = 0usize;
        for (tag, slot) in self.tree.iter_mut() {
            let TagSlot::Resident(resident) = slot else {
                continue;
            };
            if !resident.dirty && resident.handle.is_some() {
                continue;
            }
            let handle = match &resident.handle {
                Some(handle) => self.store.update(handle, tag, &resident.node)?,
                None => self.store.save(tag, &resident.node)?,
            };
            resident.handle = Some(handle);
            resident.dirty = false;
            written += 1;
        }
        debug!(written, "Persisted resident nodes");
        Ok(())
    }

    fn is_decoy(&self, accession: &str) -> bool {
        self.settings
            .decoy_suffix
            .as_deref()
            .is_some_and(|suffix| is_decoy(accession, suffix))
    }

    fn ready_tag_size(&self) -> Result<usize, IndexError> {
        match (self.state, self.params) {
            (IndexState::Ready, Some(params)) => Ok(params.tag_size),
            (state, _) => Err(IndexError::NotReady(state)),
        }
    }

    /// Every protein and position where `peptide` occurs
    pub fn query(&mut self, peptide: &str) -> Result<ProteinMapping, IndexError> {
        let tag_size = self.ready_tag_size()?;
        if peptide.chars().count() < tag_size {
            return Err(IndexError::PeptideTooShort {
                peptide: peptide.to_string(),
                tag_size,
            });
        }
        if !peptide.is_ascii() {
            return Ok(ProteinMapping::new());
        }
        if let Some(hit) = self.query_cache.as_mut().and_then(|cache| cache.get(peptide)) {
            return Ok(hit.clone());
        }

        let mut result = self.lookup(peptide, tag_size)?;
        if let Some(suffix) = self.settings.decoy_suffix.clone() {
            let reversed = reverse_peptide(peptide);
            let target_hits = if reversed == peptide {
                result.clone()
            } else {
                self.lookup(&reversed, tag_size)?
            };
            let decoys = decoy_hits(&target_hits, peptide.len(), &suffix, |accession| {
                self.protein_length(accession)
            })?;
            result.extend(decoys);
        }

        if let Some(cache) = self.query_cache.as_mut() {
            cache.put(peptide.to_string(), result.clone());
        }
        Ok(result)
    }

    /// Descend from the tag of `peptide`, making the tag resident
    fn lookup(&mut self, peptide: &str, tag_size: usize) -> Result<ProteinMapping, IndexError> {
        let tag = &peptide[..tag_size];
        let result = if self.make_resident(tag)? {
            match self.tree.get(tag) {
                Some(TagSlot::Resident(resident)) => Lookup {
                    sequences: &self.sequences,
                    store: &mut self.store,
                }
                .descend(&resident.node, peptide.as_bytes())?,
                _ => ProteinMapping::new(),
            }
        } else {
            ProteinMapping::new()
        };
        self.evict_overflow()?;
        Ok(result)
    }

    /// Positions of `peptide` in one protein; empty when it does not occur there
    pub fn query_in_protein(
        &mut self,
        peptide: &str,
        accession: &str,
    ) -> Result<Vec<Position>, IndexError> {
        Ok(self.query(peptide)?.remove(accession).unwrap_or_default())
    }

    /// Every branch end of the tree with its mapping, in alphabetical order.
    ///
    /// Decoys are not listed. Stored nodes are read as the walk reaches them and
    /// do not count against the resident budget.
    pub fn peptides(&mut self) -> Result<Peptides<'_, S>, IndexError> {
        self.ready_tag_size()?;
        let mut roots: Vec<(String, Branch<'_>)> = self
            .tree
            .iter()
            .map(|(tag, slot)| {
                let branch = match slot {
                    TagSlot::Resident(resident) => Branch::Borrowed(&resident.node),
                    TagSlot::Stored(handle) => Branch::Stored(Cow::Borrowed(handle)),
                };
                (tag.clone(), branch)
            })
            .collect();
        roots.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Peptides::new(roots, &mut self.store))
    }

    /// Spill the given share (0.0 to 1.0) of resident tags, least recently used first
    pub fn reduce_node_cache(&mut self, share: f64) -> Result<(), IndexError> {
        if !(0.0..=1.0).contains(&share) {
            return Err(IndexError::Config(format!(
                "Cache share must be between 0 and 1, got {}",
                share
            )));
        }
        let count = (self.eviction_order.len() as f64 * share).ceil() as usize;
        for _ in 0..count {
            let Some((tag, ())) = self.eviction_order.pop_lru() else {
                break;
            };
            self.evict(tag)?;
        }
        debug!(
            evicted = count,
            resident = self.nodes_in_cache(),
            "Reduced node cache"
        );
        Ok(())
    }

    pub fn empty_query_cache(&mut self) {
        if let Some(cache) = self.query_cache.as_mut() {
            cache.clear();
        }
    }

    /// Length of a protein, from the store when it records lengths
    pub fn protein_length(&self, accession: &str) -> Result<Option<usize>, IndexError> {
        if let Some(length) = self.store.protein_length(accession)? {
            return Ok(Some(length));
        }
        match self.sequences.sequence(accession) {
            Ok(sequence) => Ok(Some(sequence.len())),
            Err(crate::error::SequenceError::UnknownAccession(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Release the node store. Scratch stores are deleted.
    pub fn close(self) -> Result<(), IndexError> {
        let Self { store, .. } = self;
        store.close()?;
        Ok(())
    }
}

impl<P> ProteinTreeIndex<P, PersistentNodeStore>
where
    P: SequenceProvider,
{
    /// Discard the persistent store entirely
    pub fn delete_store(self) -> Result<(), IndexError> {
        let Self { store, .. } = self;
        store.delete()?;
        Ok(())
    }
}
