//! Core data types for taxon trees.
//!
//! - [`TaxonDescriptor`]: one parsed or resolved lineage position, not yet in a tree
//! - [`Taxon`]: a node of the taxon tree
//! - [`Item`]: an input record bound to its leaf taxon
//! - [`TaxonId`], [`TaxonKey`], [`IdOrigin`], [`ArbitraryIdPolicy`]: identifiers and policies
//!
//! ## Identity
//!
//! Taxa are stored in a flat table and refer to their parent by slot. A taxon either
//! carries an identifier or, under the `na` policy, none at all:
//!
//! | Origin     | Identifier                         | Matched by            |
//! |------------|------------------------------------|-----------------------|
//! | resolved   | from a resolver                    | identifier only       |
//! | unresolved | from the input, or absent          | identifier, or name+rank when absent |
//! | synthetic  | generated locally                  | name+rank             |
//!
//! [`TaxonDescriptor`]: taxon::TaxonDescriptor
//! [`Taxon`]: taxon::Taxon
//! [`Item`]: item::Item
//! [`TaxonId`]: types::TaxonId
//! [`TaxonKey`]: types::TaxonKey
//! [`IdOrigin`]: types::IdOrigin
//! [`ArbitraryIdPolicy`]: types::ArbitraryIdPolicy

pub mod item;
pub mod taxon;
pub mod types;
