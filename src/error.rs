//! Error types for lineage parsing, resolution, merging and binding.
//!
//! Per-record failures ([`ParseError`], and [`LookupError`] under lenient policies)
//! are collected into a batch report. Everything else aborts the operation.

use std::time::Duration;
use thiserror::Error;

use crate::core::types::TaxonId;
use crate::utils::validation::MAX_RECORDS;

/// Main error type for a classification pass
#[derive(Error, Debug)]
pub enum LineageError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Cycle error: {0}")]
    Cycle(#[from] CycleError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] crate::tree::store::SnapshotError),

    #[error("Resolver table error: {0}")]
    ResolverTable(#[from] crate::resolver::table::TableError),
}

/// Invalid settings, detected before any record is processed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unsupported arbitrary-ID policy '{0}' (expected allow, warn, error or na)")]
    UnsupportedPolicy(String),

    #[error("Unsupported resolver '{0}' (expected none or table)")]
    UnsupportedResolver(String),

    #[error("Resolver '{0}' needs network access, which this build does not provide")]
    NetworkResolver(String),

    #[error("Invalid role mapping: {0}")]
    InvalidRoles(String),

    #[error("Invalid separator: {0}")]
    InvalidSeparator(String),

    #[error("Invalid capture pattern: {0}")]
    InvalidPattern(String),

    #[error("Missing setting: {0}")]
    MissingSetting(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Failed to read configuration {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// A record's text does not have the expected structure
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty classification text")]
    Empty,

    #[error("Classification '{0}' contains no taxa")]
    NoTaxa(String),

    #[error("Record {record}: {message}")]
    Record { record: usize, message: String },

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Too many records: {0} exceeds maximum allowed ({MAX_RECORDS})")]
    TooManyRecords(usize),
}

/// A resolver could not produce a usable identifier or lineage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("No taxon found for '{0}'")]
    NotFound(String),

    #[error("Ambiguous lookup for '{key}': {} candidates", candidates.len())]
    Ambiguous {
        key: String,
        candidates: Vec<TaxonId>,
    },

    #[error("Taxon ID '{id}' for '{name}' already exists under a different parent")]
    Conflict { id: TaxonId, name: String },

    #[error("No canonical ID for taxon '{0}' and arbitrary IDs are not allowed")]
    ArbitraryId(String),

    #[error("Resolver timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cannot merge an empty lineage")]
    EmptyLineage,

    #[error("Resolver returned {got} results for {expected} keys")]
    BatchShape { expected: usize, got: usize },

    #[error("Resolver failed: {0}")]
    Resolver(String),
}

/// A taxon-scoped attribute or item identifier disagrees across items
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error(
        "Column '{column}' has conflicting values for taxon {taxon}: '{first}' vs '{second}'"
    )]
    ConflictingValue {
        column: String,
        taxon: String,
        first: String,
        second: String,
    },

    #[error("Duplicate item ID '{0}'")]
    DuplicateItemId(String),

    #[error("{items} items but {leaves} resolved taxa")]
    LengthMismatch { items: usize, leaves: usize },
}

/// Following parents from a taxon did not reach a root
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parent cycle detected at taxon slot {index}")]
pub struct CycleError {
    pub index: usize,
}
