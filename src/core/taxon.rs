use serde::{Deserialize, Serialize};

use crate::core::types::{IdOrigin, TaxonId};

/// One parsed or resolved position in a lineage, not yet bound to a taxon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxonDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,

    /// Identifier carried by the descriptor, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaxonId>,

    /// Provenance of `id`; meaningless when `id` is `None`
    #[serde(default = "default_origin")]
    pub origin: IdOrigin,
}

fn default_origin() -> IdOrigin {
    IdOrigin::Unresolved
}

impl TaxonDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rank: None,
            id: None,
            origin: IdOrigin::Unresolved,
        }
    }

    #[must_use]
    pub fn with_rank(mut self, rank: impl Into<String>) -> Self {
        self.rank = Some(rank.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>, origin: IdOrigin) -> Self {
        self.id = Some(TaxonId::new(id));
        self.origin = origin;
        self
    }
}

/// A node of the taxon tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    /// Identifier; `None` only for taxa created under the `na` policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaxonId>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,

    /// Slot of the parent in the taxon table; `None` for roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,

    pub origin: IdOrigin,
}

impl Taxon {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Anchored taxa carry an identifier that did not come from local synthesis.
    /// They only ever match descriptors carrying the same identifier.
    #[must_use]
    pub fn is_anchored(&self) -> bool {
        self.id.is_some() && self.origin != IdOrigin::Synthetic
    }

    /// Name-only descriptors match taxa that are not anchored and agree on
    /// both name and rank.
    #[must_use]
    pub fn matches_name_rank(&self, descriptor: &TaxonDescriptor) -> bool {
        !self.is_anchored() && self.name == descriptor.name && self.rank == descriptor.rank
    }

    /// Human-readable label used in diagnostics
    #[must_use]
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} ({id})", self.name),
            None => self.name.clone(),
        }
    }
}
