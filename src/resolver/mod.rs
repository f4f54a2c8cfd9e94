//! Identifier resolution against taxonomic databases.
//!
//! A resolver answers three batched questions:
//!
//! - which taxon does a name refer to ([`IdResolver::resolve_by_name`])
//! - what is the root-first lineage of a taxon ([`IdResolver::resolve_lineage`])
//! - which taxon is an item (e.g. a sequence accession) assigned to
//!   ([`IdResolver::resolve_id_from_item_id`])
//!
//! Every call takes many keys and returns one [`Resolution`] per key, in order.
//! Strategies are selected by configuration:
//!
//! - [`null::NullResolver`]: offline mode, never finds anything
//! - [`table::TableResolver`]: a local JSON taxonomy dump
//! - [`timeout::TimedResolver`]: wraps another resolver with a per-call timeout

pub mod null;
pub mod table;
pub mod timeout;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::core::taxon::TaxonDescriptor;
use crate::core::types::{IdOrigin, TaxonId};
use crate::error::{ConfigurationError, LineageError, LookupError};

/// Outcome of resolving one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
    /// Several taxa match the key
    Ambiguous(Vec<TaxonId>),
}

impl<T> Resolution<T> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Convert into a `Result`, naming `key` in the error
    ///
    /// # Errors
    ///
    /// `LookupError::NotFound` or `LookupError::Ambiguous`.
    pub fn into_result(self, key: &str) -> Result<T, LookupError> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Err(LookupError::NotFound(key.to_string())),
            Self::Ambiguous(candidates) => Err(LookupError::Ambiguous {
                key: key.to_string(),
                candidates,
            }),
        }
    }
}

/// One taxon of a lineage returned by a resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTaxon {
    pub id: TaxonId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
}

impl ResolvedTaxon {
    #[must_use]
    pub fn to_descriptor(&self) -> TaxonDescriptor {
        TaxonDescriptor {
            name: self.name.clone(),
            rank: self.rank.clone(),
            id: Some(self.id.clone()),
            origin: IdOrigin::Resolved,
        }
    }
}

/// Strategy interface for identifier resolution.
///
/// Implementations must return exactly one resolution per key, in key order.
pub trait IdResolver: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// A `LookupError` when the resolver itself fails (not for missing names).
    fn resolve_by_name(&self, names: &[String]) -> Result<Vec<Resolution<TaxonId>>, LookupError>;

    /// Root-first lineage of each identifier, ending with the taxon itself
    ///
    /// # Errors
    ///
    /// A `LookupError` when the resolver itself fails.
    fn resolve_lineage(
        &self,
        ids: &[TaxonId],
    ) -> Result<Vec<Resolution<Vec<ResolvedTaxon>>>, LookupError>;

    /// # Errors
    ///
    /// A `LookupError` when the resolver itself fails.
    fn resolve_id_from_item_id(
        &self,
        item_ids: &[String],
    ) -> Result<Vec<Resolution<TaxonId>>, LookupError>;
}

/// Resolve each distinct key once and return the results keyed for broadcast.
///
/// `lookup` is called at most once, with keys in first-seen order.
///
/// # Errors
///
/// Propagates errors from `lookup`, and returns `LookupError::BatchShape` if it
/// returns the wrong number of results.
pub fn resolve_distinct<K, T, F>(
    keys: &[K],
    lookup: F,
) -> Result<HashMap<K, Resolution<T>>, LookupError>
where
    K: Eq + Hash + Clone,
    F: FnOnce(&[K]) -> Result<Vec<Resolution<T>>, LookupError>,
{
    let mut distinct: Vec<K> = Vec::new();
    let mut seen: HashMap<K, ()> = HashMap::new();
    for key in keys {
        if seen.insert(key.clone(), ()).is_none() {
            distinct.push(key.clone());
        }
    }

    if distinct.is_empty() {
        return Ok(HashMap::new());
    }

    let results = lookup(&distinct)?;
    if results.len() != distinct.len() {
        return Err(LookupError::BatchShape {
            expected: distinct.len(),
            got: results.len(),
        });
    }

    Ok(distinct.into_iter().zip(results).collect())
}

/// Which resolver strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResolverKind {
    /// Fully offline: every lookup reports not found
    #[default]
    None,
    /// Local JSON taxonomy table
    Table,
}

/// Live databases that are recognized but need network access
const NETWORK_DATABASES: [&str; 8] = [
    "ncbi", "itis", "bold", "gbif", "eol", "col", "tropicos", "nbn",
];

impl FromStr for ResolverKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "none" | "offline" => Ok(Self::None),
            "table" => Ok(Self::Table),
            db if NETWORK_DATABASES.contains(&db) => {
                Err(ConfigurationError::NetworkResolver(s.to_string()))
            }
            _ => Err(ConfigurationError::UnsupportedResolver(s.to_string())),
        }
    }
}

impl TryFrom<String> for ResolverKind {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResolverKind> for String {
    fn from(kind: ResolverKind) -> Self {
        match kind {
            ResolverKind::None => "none".to_string(),
            ResolverKind::Table => "table".to_string(),
        }
    }
}

/// Resolver selection and settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub kind: ResolverKind,

    /// Taxonomy table for `ResolverKind::Table`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<PathBuf>,

    /// Per-call timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ResolverSettings {
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a table resolver has no table, or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.kind == ResolverKind::Table && self.table.is_none() {
            return Err(ConfigurationError::MissingSetting(
                "the table resolver needs a taxonomy table path".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigurationError::InvalidSetting(
                "resolver timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Construct the selected resolver
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for invalid settings, or a table loading error.
    pub fn build(&self) -> Result<Box<dyn IdResolver>, LineageError> {
        self.validate()?;

        let resolver: Box<dyn IdResolver> = match (&self.kind, &self.table) {
            (ResolverKind::Table, Some(path)) => Box::new(table::TableResolver::load_from_file(path)?),
            _ => Box::new(null::NullResolver),
        };

        match self.timeout_secs {
            Some(secs) => Ok(Box::new(timeout::TimedResolver::new(
                Arc::from(resolver),
                Duration::from_secs(secs),
            ))),
            None => Ok(resolver),
        }
    }
}
