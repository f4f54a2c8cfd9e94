//! Merging lineages into a taxon tree.
//!
//! The registry walks a root-first lineage from the top of the forest, reusing
//! existing children where a descriptor matches and creating taxa where none
//! does. Matching rules:
//!
//! | Descriptor | Matches a child that |
//! |------------|----------------------|
//! | carries an ID | has the same ID |
//! | has no ID | is not anchored and has equal name and rank |
//!
//! A child is anchored when its ID came from a resolver or from the input. An ID
//! mismatch always creates a new taxon, even for identical name and rank.

use serde::Serialize;

use crate::core::taxon::{Taxon, TaxonDescriptor};
use crate::core::types::{ArbitraryIdPolicy, IdOrigin, TaxonId};
use crate::error::{LineageError, LookupError};
use crate::resolver::ResolvedTaxon;
use crate::tree::store::TaxonTree;

/// Default prefix for locally synthesized taxon IDs
pub const DEFAULT_SYNTHETIC_PREFIX: &str = "tx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    pub policy: ArbitraryIdPolicy,
    pub synthetic_prefix: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            policy: ArbitraryIdPolicy::default(),
            synthetic_prefix: DEFAULT_SYNTHETIC_PREFIX.to_string(),
        }
    }
}

/// Result of merging one lineage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Slot of the last taxon in the lineage
    pub leaf: usize,
    /// Slots from root to leaf
    pub path: Vec<usize>,
    /// Number of taxa created by this merge
    pub created: usize,
}

/// Counters across all merges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub merges: usize,
    pub created: usize,
    pub reused: usize,
    pub synthesized: usize,
    /// Synthetic IDs assigned with a warning under the `warn` policy
    pub warned: usize,
}

/// Sole owner and mutator of a taxon tree while lineages are merged
#[derive(Debug)]
pub struct TaxonRegistry {
    tree: TaxonTree,
    options: RegistryOptions,
    next_synthetic: u64,
    stats: RegistryStats,
}

impl TaxonRegistry {
    #[must_use]
    pub fn new(options: RegistryOptions) -> Self {
        Self::with_tree(TaxonTree::new(), options)
    }

    /// Continue merging into an existing tree
    #[must_use]
    pub fn with_tree(tree: TaxonTree, options: RegistryOptions) -> Self {
        Self {
            tree,
            options,
            next_synthetic: 0,
            stats: RegistryStats::default(),
        }
    }

    #[must_use]
    pub fn tree(&self) -> &TaxonTree {
        &self.tree
    }

    #[must_use]
    pub fn into_tree(self) -> TaxonTree {
        self.tree
    }

    #[must_use]
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    /// Merge a root-first lineage and return its leaf.
    ///
    /// Ancestors created before a failure stay in the tree.
    ///
    /// # Errors
    ///
    /// - `LookupError::EmptyLineage` for an empty lineage
    /// - `LookupError::ArbitraryId` when a taxon needs a synthetic ID under the
    ///   `error` policy
    /// - `LookupError::Conflict` when a descriptor's ID already exists under a
    ///   different parent
    pub fn merge(&mut self, lineage: &[TaxonDescriptor]) -> Result<MergeOutcome, LineageError> {
        if lineage.is_empty() {
            return Err(LookupError::EmptyLineage.into());
        }

        let mut current: Option<usize> = None;
        let mut path = Vec::with_capacity(lineage.len());
        let mut created = 0;

        for descriptor in lineage {
            let index = match self.find_child(current, descriptor) {
                Some(index) => {
                    if let Some(rank) = &descriptor.rank {
                        self.tree.fill_rank(index, rank);
                    }
                    self.stats.reused += 1;
                    index
                }
                None => {
                    created += 1;
                    self.create(current, descriptor)?
                }
            };
            path.push(index);
            current = Some(index);
        }

        self.stats.merges += 1;
        let leaf = path[path.len() - 1];
        Ok(MergeOutcome {
            leaf,
            path,
            created,
        })
    }

    /// Merge a lineage returned by a resolver
    ///
    /// # Errors
    ///
    /// See [`TaxonRegistry::merge`].
    pub fn merge_resolved(&mut self, lineage: &[ResolvedTaxon]) -> Result<MergeOutcome, LineageError> {
        let descriptors: Vec<TaxonDescriptor> =
            lineage.iter().map(ResolvedTaxon::to_descriptor).collect();
        self.merge(&descriptors)
    }

    fn find_child(&self, parent: Option<usize>, descriptor: &TaxonDescriptor) -> Option<usize> {
        let children = self.tree.children_of(parent);
        match &descriptor.id {
            // A synthetic ID names a local taxon, never a canonical one
            Some(id) => children.iter().copied().find(|&child| {
                self.tree.get(child).is_some_and(|t| {
                    t.origin != IdOrigin::Synthetic && t.id.as_ref() == Some(id)
                })
            }),
            None => children.iter().copied().find(|&child| {
                self.tree
                    .get(child)
                    .is_some_and(|t| t.matches_name_rank(descriptor))
            }),
        }
    }

    fn create(
        &mut self,
        parent: Option<usize>,
        descriptor: &TaxonDescriptor,
    ) -> Result<usize, LineageError> {
        let (id, origin) = match &descriptor.id {
            Some(id) => (Some(id.clone()), descriptor.origin),
            None => match self.options.policy {
                ArbitraryIdPolicy::Allow => (Some(self.synthesize()), IdOrigin::Synthetic),
                ArbitraryIdPolicy::Warn => {
                    let id = self.synthesize();
                    self.stats.warned += 1;
                    tracing::warn!(
                        taxon = %descriptor.name,
                        rank = descriptor.rank.as_deref().unwrap_or("unknown"),
                        id = %id,
                        "No canonical ID, assigned an arbitrary one"
                    );
                    (Some(id), IdOrigin::Synthetic)
                }
                ArbitraryIdPolicy::Error => {
                    return Err(LookupError::ArbitraryId(descriptor.name.clone()).into());
                }
                ArbitraryIdPolicy::Na => (None, IdOrigin::Unresolved),
            },
        };

        let index = self.tree.insert(Taxon {
            id,
            name: descriptor.name.clone(),
            rank: descriptor.rank.clone(),
            parent,
            origin,
        })?;

        self.stats.created += 1;
        if origin == IdOrigin::Synthetic {
            self.stats.synthesized += 1;
        }
        tracing::debug!(index, taxon = %descriptor.name, "Created taxon");
        Ok(index)
    }

    /// Next unused synthetic ID
    fn synthesize(&mut self) -> TaxonId {
        loop {
            self.next_synthetic += 1;
            let candidate = TaxonId::new(format!(
                "{}{}",
                self.options.synthetic_prefix, self.next_synthetic
            ));
            if !self.tree.contains_id(&candidate) {
                return candidate;
            }
        }
    }
}
