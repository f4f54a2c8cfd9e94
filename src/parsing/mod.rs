//! Parsers turning input records into taxon descriptors.
//!
//! This module provides:
//!
//! - **Input adapters**: plain text records or FASTA sequence collections
//!   (optionally gzip compressed), see [`input`]
//! - **Record parsing**: capture specifications mapping regex groups or delimited
//!   fields to semantic roles, see [`record`]
//! - **Lineage parsing**: splitting classification strings into root-first
//!   descriptors, see [`lineage`]
//!
//! ## Example
//!
//! ```rust
//! use lineage_solver::parsing::lineage::{LineageFormat, LineageParser};
//!
//! let parser = LineageParser::new(LineageFormat {
//!     rank_separator: Some("__".to_string()),
//!     normalize_ranks: true,
//!     ..LineageFormat::default()
//! })
//! .unwrap();
//!
//! let lineage = parser.parse("k__Fungi;p__Ascomycota;c__Saccharomycetes").unwrap();
//! assert_eq!(lineage[0].name, "Fungi");
//! assert_eq!(lineage[0].rank.as_deref(), Some("kingdom"));
//! ```
//!
//! ## Roles
//!
//! | Role | Description | Scope |
//! |------|-------------|-------|
//! | `taxon_id` | Identifier of the record's taxon | taxon |
//! | `taxon_name` | Name of the record's taxon | taxon |
//! | `lineage` | Classification string | taxon |
//! | `item_id` | Identifier of the record itself | item |
//! | `item_name` | Name of the record | item |
//! | `item_info:<col>` | Arbitrary metadata | item |
//! | `taxon_info:<col>` | Metadata that must agree per taxon | taxon |

pub mod fasta;
pub mod input;
pub mod lineage;
pub mod ranks;
pub mod record;
