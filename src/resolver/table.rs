//! Resolver backed by a local taxonomy table.
//!
//! The table is a JSON document:
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "taxa": [
//!     {"id": "4751", "name": "Fungi", "rank": "kingdom"},
//!     {"id": "4890", "name": "Ascomycota", "rank": "phylum", "parent": "4751"}
//!   ],
//!   "items": {"AB1234": "4890"}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::core::types::TaxonId;
use crate::error::LookupError;
use crate::resolver::{IdResolver, Resolution, ResolvedTaxon};

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read taxonomy table: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse taxonomy table: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Taxon '{id}' names parent '{parent}', which is not in the table")]
    MissingParent { id: TaxonId, parent: TaxonId },

    #[error("Taxon '{0}' appears more than once")]
    DuplicateTaxon(TaxonId),

    #[error("Parent chain of taxon '{0}' does not reach a root")]
    Cycle(TaxonId),

    #[error("Item '{item}' is assigned to unknown taxon '{taxon}'")]
    UnknownItemTaxon { item: String, taxon: TaxonId },
}

/// Taxonomy table format version
pub const TABLE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub id: TaxonId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaxonId>,
}

/// Serializable taxonomy table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableData {
    #[serde(default = "default_version")]
    pub version: String,
    pub taxa: Vec<TableEntry>,
    #[serde(default)]
    pub items: BTreeMap<String, TaxonId>,
}

fn default_version() -> String {
    TABLE_VERSION.to_string()
}

/// Resolver answering from an in-memory taxonomy table
#[derive(Debug)]
pub struct TableResolver {
    entries: Vec<TableEntry>,

    /// Index: taxon ID -> index in entries
    id_to_index: HashMap<TaxonId, usize>,

    /// Index: name -> indices of entries with that name
    name_to_indices: HashMap<String, Vec<usize>>,

    /// Index: item ID -> taxon ID
    items: HashMap<String, TaxonId>,
}

impl TableResolver {
    /// Load a taxonomy table from a JSON file
    ///
    /// # Errors
    ///
    /// Returns a `TableError` if the file cannot be read, is not valid JSON, or
    /// describes an inconsistent taxonomy.
    pub fn load_from_file(path: &Path) -> Result<Self, TableError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a taxonomy table from a JSON string
    ///
    /// # Errors
    ///
    /// See [`TableResolver::load_from_file`].
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let data: TableData = serde_json::from_str(json)?;

        if data.version != TABLE_VERSION {
            tracing::warn!(
                expected = TABLE_VERSION,
                found = %data.version,
                "Taxonomy table version mismatch"
            );
        }

        Self::from_data(data)
    }

    /// Build the resolver from table data, validating parent links
    ///
    /// # Errors
    ///
    /// Returns `TableError::DuplicateTaxon`, `MissingParent`, `Cycle` or
    /// `UnknownItemTaxon`.
    pub fn from_data(data: TableData) -> Result<Self, TableError> {
        let mut id_to_index = HashMap::with_capacity(data.taxa.len());
        let mut name_to_indices: HashMap<String, Vec<usize>> = HashMap::new();

        for (index, entry) in data.taxa.iter().enumerate() {
            if id_to_index.insert(entry.id.clone(), index).is_some() {
                return Err(TableError::DuplicateTaxon(entry.id.clone()));
            }
            name_to_indices
                .entry(entry.name.clone())
                .or_default()
                .push(index);
        }

        for entry in &data.taxa {
            if let Some(parent) = &entry.parent {
                if !id_to_index.contains_key(parent) {
                    return Err(TableError::MissingParent {
                        id: entry.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        for (item, taxon) in &data.items {
            if !id_to_index.contains_key(taxon) {
                return Err(TableError::UnknownItemTaxon {
                    item: item.clone(),
                    taxon: taxon.clone(),
                });
            }
        }

        let resolver = Self {
            entries: data.taxa,
            id_to_index,
            name_to_indices,
            items: data.items.into_iter().collect(),
        };

        // A chain longer than the table must revisit some taxon
        for entry in &resolver.entries {
            if resolver.chain(&entry.id).is_none() {
                return Err(TableError::Cycle(entry.id.clone()));
            }
        }

        tracing::debug!(
            taxa = resolver.entries.len(),
            items = resolver.items.len(),
            "Loaded taxonomy table"
        );

        Ok(resolver)
    }

    /// Root-first chain of entries ending at `id`; `None` on a cycle or unknown id
    fn chain(&self, id: &TaxonId) -> Option<Vec<&TableEntry>> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            if chain.len() > self.entries.len() {
                return None;
            }
            let entry = &self.entries[*self.id_to_index.get(id)?];
            chain.push(entry);
            current = entry.parent.as_ref();
        }
        chain.reverse();
        Some(chain)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IdResolver for TableResolver {
    fn name(&self) -> &str {
        "table"
    }

    fn resolve_by_name(&self, names: &[String]) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        Ok(names
            .iter()
            .map(|name| match self.name_to_indices.get(name).map(Vec::as_slice) {
                None | Some([]) => Resolution::NotFound,
                Some([index]) => Resolution::Found(self.entries[*index].id.clone()),
                Some(indices) => Resolution::Ambiguous(
                    indices.iter().map(|&i| self.entries[i].id.clone()).collect(),
                ),
            })
            .collect())
    }

    fn resolve_lineage(
        &self,
        ids: &[TaxonId],
    ) -> Result<Vec<Resolution<Vec<ResolvedTaxon>>>, LookupError> {
        Ok(ids
            .iter()
            .map(|id| match self.chain(id) {
                Some(chain) => Resolution::Found(
                    chain
                        .into_iter()
                        .map(|entry| ResolvedTaxon {
                            id: entry.id.clone(),
                            name: entry.name.clone(),
                            rank: entry.rank.clone(),
                        })
                        .collect(),
                ),
                None => Resolution::NotFound,
            })
            .collect())
    }

    fn resolve_id_from_item_id(
        &self,
        item_ids: &[String],
    ) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        Ok(item_ids
            .iter()
            .map(|item| match self.items.get(item) {
                Some(id) => Resolution::Found(id.clone()),
                None => Resolution::NotFound,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "version": "1.0.0",
        "taxa": [
            {"id": "4751", "name": "Fungi", "rank": "kingdom"},
            {"id": "4890", "name": "Ascomycota", "rank": "phylum", "parent": "4751"},
            {"id": "4891", "name": "Saccharomycetes", "rank": "class", "parent": "4890"},
            {"id": "55", "name": "Bacillus", "rank": "genus"},
            {"id": "56", "name": "Bacillus", "rank": "genus"}
        ],
        "items": {"AB1234": "4891"}
    }"#;

    #[test]
    fn test_resolve_lineage_is_root_first() {
        let resolver = TableResolver::from_json(TABLE).unwrap();
        let resolved = resolver
            .resolve_lineage(&[TaxonId::from("4891"), TaxonId::from("999")])
            .unwrap();

        let Resolution::Found(lineage) = &resolved[0] else {
            panic!("expected lineage, got {:?}", resolved[0]);
        };
        let names: Vec<&str> = lineage.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Fungi", "Ascomycota", "Saccharomycetes"]);
        assert_eq!(lineage[0].rank.as_deref(), Some("kingdom"));
        assert_eq!(resolved[1], Resolution::NotFound);
    }

    #[test]
    fn test_resolve_by_name() {
        let resolver = TableResolver::from_json(TABLE).unwrap();
        let names = vec![
            "Fungi".to_string(),
            "Bacillus".to_string(),
            "Metazoa".to_string(),
        ];
        let resolved = resolver.resolve_by_name(&names).unwrap();

        assert_eq!(resolved[0], Resolution::Found(TaxonId::from("4751")));
        assert_eq!(
            resolved[1],
            Resolution::Ambiguous(vec![TaxonId::from("55"), TaxonId::from("56")])
        );
        assert_eq!(resolved[2], Resolution::NotFound);
    }

    #[test]
    fn test_resolve_item_ids() {
        let resolver = TableResolver::from_json(TABLE).unwrap();
        let resolved = resolver
            .resolve_id_from_item_id(&["AB1234".to_string(), "ZZ0".to_string()])
            .unwrap();
        assert_eq!(
            resolved,
            vec![Resolution::Found(TaxonId::from("4891")), Resolution::NotFound]
        );
    }

    #[test]
    fn test_missing_parent_is_rejected() {
        let json = r#"{"taxa": [{"id": "2", "name": "Ascomycota", "parent": "1"}]}"#;
        assert!(matches!(
            TableResolver::from_json(json),
            Err(TableError::MissingParent { .. })
        ));
    }

    #[test]
    fn test_parent_cycle_is_rejected() {
        let json = r#"{"taxa": [
            {"id": "1", "name": "A", "parent": "2"},
            {"id": "2", "name": "B", "parent": "1"}
        ]}"#;
        assert!(matches!(
            TableResolver::from_json(json),
            Err(TableError::Cycle(_))
        ));
    }

    #[test]
    fn test_unknown_item_taxon_is_rejected() {
        let json = r#"{"taxa": [{"id": "1", "name": "A"}], "items": {"x": "9"}}"#;
        assert!(matches!(
            TableResolver::from_json(json),
            Err(TableError::UnknownItemTaxon { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), TABLE).unwrap();
        let resolver = TableResolver::load_from_file(temp.path()).unwrap();
        assert_eq!(resolver.len(), 5);
    }
}
