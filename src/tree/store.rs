use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::core::item::Item;
use crate::core::taxon::Taxon;
use crate::core::types::{IdOrigin, ReturnMode, TaxonId, TaxonKey};
use crate::error::{CycleError, LineageError, LookupError};
use crate::utils::validation::compute_signature;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read or write snapshot: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse snapshot: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Snapshot contains a parent cycle: {0}")]
    Cycle(#[from] CycleError),

    #[error("Snapshot contains taxon ID '{0}' more than once")]
    DuplicateId(TaxonId),

    #[error("Item '{item}' refers to taxon slot {index}, which does not exist")]
    DanglingItem { item: String, index: usize },
}

/// Snapshot format version for compatibility checking
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Forest of taxa stored in an arena.
///
/// Every parent slot is strictly smaller than its child's slot, so a cycle
/// cannot be represented.
#[derive(Debug, Clone, Default)]
pub struct TaxonTree {
    taxa: Vec<Taxon>,

    /// Index: taxon ID -> slot
    id_to_index: HashMap<TaxonId, usize>,

    /// Children of each slot, in insertion order
    children: Vec<Vec<usize>>,

    /// Slots without a parent, in insertion order
    roots: Vec<usize>,
}

impl TaxonTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tree from a taxon table, checking every structural invariant
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Cycle` if a parent does not precede its child or
    /// a parent walk does not terminate, or `SnapshotError::DuplicateId`.
    pub fn from_taxa(taxa: Vec<Taxon>) -> Result<Self, SnapshotError> {
        let mut tree = Self::new();
        for (index, taxon) in taxa.into_iter().enumerate() {
            if taxon.parent.is_some_and(|parent| parent >= index) {
                return Err(CycleError { index }.into());
            }
            if let Some(id) = &taxon.id {
                if tree.contains_id(id) {
                    return Err(SnapshotError::DuplicateId(id.clone()));
                }
            }
            tree.push(taxon);
        }
        tree.validate()?;
        Ok(tree)
    }

    /// Append a taxon under its parent
    ///
    /// # Errors
    ///
    /// Returns a `CycleError` if the parent slot does not exist yet, or
    /// `LookupError::Conflict` if the identifier is already taken.
    pub fn insert(&mut self, taxon: Taxon) -> Result<usize, LineageError> {
        let index = self.taxa.len();
        if taxon.parent.is_some_and(|parent| parent >= index) {
            return Err(CycleError { index }.into());
        }
        if let Some(id) = &taxon.id {
            if self.contains_id(id) {
                return Err(LookupError::Conflict {
                    id: id.clone(),
                    name: taxon.name.clone(),
                }
                .into());
            }
        }
        Ok(self.push(taxon))
    }

    fn push(&mut self, taxon: Taxon) -> usize {
        let index = self.taxa.len();
        if let Some(id) = &taxon.id {
            self.id_to_index.insert(id.clone(), index);
        }
        match taxon.parent {
            Some(parent) => self.children[parent].push(index),
            None => self.roots.push(index),
        }
        self.children.push(Vec::new());
        self.taxa.push(taxon);
        index
    }

    /// Record a rank that was unknown when the taxon was created
    pub(crate) fn fill_rank(&mut self, index: usize, rank: &str) {
        if let Some(taxon) = self.taxa.get_mut(index) {
            if taxon.rank.is_none() {
                taxon.rank = Some(rank.to_string());
            }
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Taxon> {
        self.taxa.get(index)
    }

    #[must_use]
    pub fn taxa(&self) -> &[Taxon] {
        &self.taxa
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    #[must_use]
    pub fn contains_id(&self, id: &TaxonId) -> bool {
        self.id_to_index.contains_key(id)
    }

    #[must_use]
    pub fn index_of(&self, id: &TaxonId) -> Option<usize> {
        self.id_to_index.get(id).copied()
    }

    /// Slot addressed by a key, if it exists
    #[must_use]
    pub fn resolve(&self, key: &TaxonKey) -> Option<usize> {
        match key {
            TaxonKey::Id(id) => self.index_of(id),
            TaxonKey::Index(index) => (*index < self.taxa.len()).then_some(*index),
        }
    }

    /// How a slot is named in results; taxa without an ID always use their slot
    #[must_use]
    pub fn key_of(&self, index: usize, mode: ReturnMode) -> TaxonKey {
        match (mode, self.taxa.get(index).and_then(|t| t.id.as_ref())) {
            (ReturnMode::Id, Some(id)) => TaxonKey::Id(id.clone()),
            _ => TaxonKey::Index(index),
        }
    }

    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Children of `parent`, or the roots when `parent` is `None`
    #[must_use]
    pub fn children_of(&self, parent: Option<usize>) -> &[usize] {
        match parent {
            Some(index) => self.children.get(index).map(Vec::as_slice).unwrap_or(&[]),
            None => &self.roots,
        }
    }

    #[must_use]
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.taxa.get(index).and_then(|t| t.parent)
    }

    /// Root-first slots from the root down to `index`
    ///
    /// # Errors
    ///
    /// Returns a `CycleError` if the walk visits more slots than the tree holds.
    pub fn lineage(&self, index: usize) -> Result<Vec<usize>, CycleError> {
        let mut chain = Vec::new();
        let mut current = Some(index);
        while let Some(slot) = current {
            if chain.len() >= self.taxa.len() {
                return Err(CycleError { index });
            }
            chain.push(slot);
            current = self.parent_of(slot);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Check that every parent walk reaches a root
    ///
    /// # Errors
    ///
    /// Returns the first `CycleError` found.
    pub fn validate(&self) -> Result<(), CycleError> {
        for index in 0..self.taxa.len() {
            self.lineage(index)?;
        }
        Ok(())
    }

    /// Digest of the tree shape over names and ranks only.
    ///
    /// Two trees built from the same lineages under different ID policies share
    /// a signature.
    #[must_use]
    pub fn topology_signature(&self) -> String {
        let paths = (0..self.taxa.len()).filter_map(|index| {
            let chain = self.lineage(index).ok()?;
            Some(
                chain
                    .iter()
                    .map(|&slot| {
                        let taxon = &self.taxa[slot];
                        format!("{}|{}", taxon.name, taxon.rank.as_deref().unwrap_or(""))
                    })
                    .collect::<Vec<_>>()
                    .join(";"),
            )
        });
        compute_signature(paths)
    }

    /// Flat taxon table, one row per slot
    #[must_use]
    pub fn taxon_rows(&self) -> Vec<TaxonRow> {
        self.taxa
            .iter()
            .enumerate()
            .map(|(index, taxon)| TaxonRow {
                index,
                taxon_id: taxon.id.clone(),
                parent_index: taxon.parent,
                parent_id: taxon
                    .parent
                    .and_then(|parent| self.taxa[parent].id.clone()),
                name: taxon.name.clone(),
                rank: taxon.rank.clone(),
                origin: taxon.origin,
                metadata: BTreeMap::new(),
            })
            .collect()
    }
}

/// One row of the taxon table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonRow {
    pub index: usize,
    pub taxon_id: Option<TaxonId>,
    pub parent_index: Option<usize>,
    pub parent_id: Option<TaxonId>,
    pub name: String,
    pub rank: Option<String>,
    pub origin: IdOrigin,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Serializable tree plus bound items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub version: String,
    pub created_at: String,
    pub taxa: Vec<Taxon>,
    #[serde(default)]
    pub items: Vec<Item>,
    /// Taxon-scoped metadata keyed by slot
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub taxon_info: BTreeMap<usize, BTreeMap<String, String>>,
}

impl TreeSnapshot {
    #[must_use]
    pub fn new(
        tree: &TaxonTree,
        items: Vec<Item>,
        taxon_info: BTreeMap<usize, BTreeMap<String, String>>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            taxa: tree.taxa().to_vec(),
            items,
            taxon_info,
        }
    }

    /// Load a snapshot from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let snapshot: Self = serde_json::from_reader(reader)?;

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                expected = SNAPSHOT_VERSION,
                found = %snapshot.version,
                "Snapshot version mismatch"
            );
        }

        Ok(snapshot)
    }

    /// Save to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Rebuild the tree, validating structure and item references
    ///
    /// # Errors
    ///
    /// See [`TaxonTree::from_taxa`]; also `SnapshotError::DanglingItem`.
    pub fn into_parts(self) -> Result<(TaxonTree, Vec<Item>), SnapshotError> {
        let tree = TaxonTree::from_taxa(self.taxa)?;
        for item in &self.items {
            if let Some(index) = item.taxon.filter(|&index| index >= tree.len()) {
                return Err(SnapshotError::DanglingItem {
                    item: item.item_id.clone(),
                    index,
                });
            }
        }
        Ok((tree, self.items))
    }
}
