//! # lineage-solver
//!
//! A library for turning free-text taxonomic records into one deduplicated taxon tree.
//!
//! Records from different sources describe taxa in different ways: a classification
//! string such as `k__Fungi;p__Ascomycota`, a bare taxon name, a database
//! identifier, or only an accession. `lineage-solver` extracts whichever of these a
//! record carries, resolves it to a root-first lineage, merges every lineage into
//! a single forest and binds each record to its leaf taxon.
//!
//! ## Features
//!
//! - **Flexible capture**: regex groups or delimited fields mapped to roles
//! - **Lineage parsing**: configurable separators, rank order and rank abbreviations
//! - **Deterministic merging**: identifiers take precedence over names; names must
//!   agree on rank
//! - **Arbitrary-ID policy**: synthesize, warn, abort or leave identifiers empty
//! - **Batched resolution**: each distinct name or identifier is looked up once
//! - **Tree queries**: roots, supertaxa, subtaxa and leaves by identifier or slot
//!
//! ## Example
//!
//! ```rust
//! use lineage_solver::config::PipelineConfig;
//! use lineage_solver::parsing::input::LabeledText;
//! use lineage_solver::pipeline::classify::Classifier;
//! use lineage_solver::resolver::null::NullResolver;
//!
//! let classifier = Classifier::new(PipelineConfig::default(), Box::new(NullResolver)).unwrap();
//! let records = vec![
//!     LabeledText::new("Fungi;Ascomycota;Saccharomycetes"),
//!     LabeledText::new("Fungi;Basidiomycota"),
//! ];
//!
//! let result = classifier.classify(&records).unwrap();
//! assert_eq!(result.tree.len(), 4);
//! assert_eq!(result.tree.roots().len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Taxa, descriptors, items and identifier types
//! - [`parsing`]: Input adapters, capture specifications and lineage parsing
//! - [`resolver`]: Identifier resolution strategies
//! - [`tree`]: Taxon tree storage, merging and traversal
//! - [`pipeline`]: End-to-end classification and item binding
//! - [`config`]: Pipeline configuration
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod parsing;
pub mod pipeline;
pub mod resolver;
pub mod tree;
pub mod utils;

pub use config::PipelineConfig;
pub use error::LineageError;
pub use pipeline::classify::{Classification, Classifier};
pub use tree::registry::TaxonRegistry;
pub use tree::store::TaxonTree;
pub use tree::traversal::TraversalEngine;
