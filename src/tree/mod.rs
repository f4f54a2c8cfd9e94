//! The taxon tree and the components that build and query it.
//!
//! - [`store::TaxonTree`]: arena of taxa with ID and child indexes, plus JSON
//!   snapshots
//! - [`registry::TaxonRegistry`]: merges lineages, the only writer of a tree
//! - [`traversal::TraversalEngine`]: read-only ancestor and descendant queries
//!
//! ## Example
//!
//! ```rust
//! use lineage_solver::core::taxon::TaxonDescriptor;
//! use lineage_solver::core::types::{ReturnMode, TaxonKey};
//! use lineage_solver::tree::registry::{RegistryOptions, TaxonRegistry};
//! use lineage_solver::tree::traversal::{SupertaxaOptions, TraversalEngine};
//!
//! let mut registry = TaxonRegistry::new(RegistryOptions::default());
//! let outcome = registry
//!     .merge(&[TaxonDescriptor::new("Fungi"), TaxonDescriptor::new("Ascomycota")])
//!     .unwrap();
//!
//! let tree = registry.into_tree();
//! let engine = TraversalEngine::new(&tree);
//! let parents = engine.supertaxa(
//!     &[TaxonKey::Index(outcome.leaf)],
//!     &SupertaxaOptions {
//!         return_mode: ReturnMode::Index,
//!         ..SupertaxaOptions::default()
//!     },
//! );
//! assert_eq!(parents.len(), 1);
//! ```

pub mod registry;
pub mod store;
pub mod traversal;
