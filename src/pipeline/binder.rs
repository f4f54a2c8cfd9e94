use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use crate::core::item::Item;
use crate::core::types::TaxonId;
use crate::error::ConsistencyError;
use crate::tree::store::{TaxonRow, TaxonTree};

/// Item fields collected from one parsed record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub item_id: Option<String>,
    pub name: Option<String>,
    pub item_info: BTreeMap<String, String>,
    pub taxon_info: BTreeMap<String, String>,
}

/// Item table plus the taxon-scoped metadata gathered from items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundTables {
    pub items: Vec<Item>,
    /// Taxon-scoped columns keyed by taxon slot
    pub taxon_info: BTreeMap<usize, BTreeMap<String, String>>,
}

/// One row of the item table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRow {
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub taxon_index: Option<usize>,
    pub taxon_id: Option<TaxonId>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl BoundTables {
    /// Taxon table with the bound taxon-scoped metadata attached
    #[must_use]
    pub fn taxon_rows(&self, tree: &TaxonTree) -> Vec<TaxonRow> {
        let mut rows = tree.taxon_rows();
        for (index, info) in &self.taxon_info {
            if let Some(row) = rows.get_mut(*index) {
                row.metadata.clone_from(info);
            }
        }
        rows
    }

    #[must_use]
    pub fn item_rows(&self, tree: &TaxonTree) -> Vec<ItemRow> {
        self.items
            .iter()
            .map(|item| ItemRow {
                item_id: item.item_id.clone(),
                name: item.name.clone(),
                taxon_index: item.taxon,
                taxon_id: item
                    .taxon
                    .and_then(|index| tree.get(index))
                    .and_then(|taxon| taxon.id.clone()),
                metadata: item.metadata.clone(),
            })
            .collect()
    }
}

/// Attaches items to their leaf taxa and checks taxon-scoped columns.
///
/// The tree is only read.
pub struct ItemBinder<'a> {
    tree: &'a TaxonTree,
}

impl<'a> ItemBinder<'a> {
    pub fn new(tree: &'a TaxonTree) -> Self {
        Self { tree }
    }

    /// Bind each draft to the leaf at the same position.
    ///
    /// Items without an ID get the next unused number, starting at `1`.
    /// Taxon-scoped values of items without a leaf stay with the item.
    ///
    /// # Errors
    ///
    /// - `ConsistencyError::LengthMismatch` if `drafts` and `leaves` differ in length
    /// - `ConsistencyError::DuplicateItemId` for a repeated explicit item ID
    /// - `ConsistencyError::ConflictingValue` when two items of one taxon disagree
    ///   on a taxon-scoped column
    pub fn bind(
        &self,
        drafts: Vec<ItemDraft>,
        leaves: &[Option<usize>],
    ) -> Result<BoundTables, ConsistencyError> {
        if drafts.len() != leaves.len() {
            return Err(ConsistencyError::LengthMismatch {
                items: drafts.len(),
                leaves: leaves.len(),
            });
        }

        let mut used: HashSet<&str> = HashSet::new();
        for id in drafts.iter().filter_map(|d| d.item_id.as_deref()) {
            if !used.insert(id) {
                return Err(ConsistencyError::DuplicateItemId(id.to_string()));
            }
        }
        let used: HashSet<String> = used.into_iter().map(str::to_string).collect();

        let mut next_id = 0_u64;
        let mut tables = BoundTables::default();

        for (draft, &leaf) in drafts.into_iter().zip(leaves) {
            let item_id = match draft.item_id {
                Some(id) => id,
                None => loop {
                    next_id += 1;
                    let candidate = next_id.to_string();
                    if !used.contains(&candidate) {
                        break candidate;
                    }
                },
            };

            let mut metadata = draft.item_info;
            match leaf {
                Some(index) => self.record_taxon_info(&mut tables, index, draft.taxon_info)?,
                None => metadata.extend(draft.taxon_info),
            }

            tables.items.push(Item {
                item_id,
                name: draft.name,
                taxon: leaf,
                metadata,
            });
        }

        Ok(tables)
    }

    fn record_taxon_info(
        &self,
        tables: &mut BoundTables,
        index: usize,
        info: BTreeMap<String, String>,
    ) -> Result<(), ConsistencyError> {
        if info.is_empty() {
            return Ok(());
        }
        let columns = tables.taxon_info.entry(index).or_default();
        for (column, value) in info {
            match columns.entry(column) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(entry) if *entry.get() != value => {
                    return Err(ConsistencyError::ConflictingValue {
                        column: entry.key().clone(),
                        taxon: self.label(index),
                        first: entry.get().clone(),
                        second: value,
                    });
                }
                Entry::Occupied(_) => {}
            }
        }
        Ok(())
    }

    fn label(&self, index: usize) -> String {
        self.tree
            .get(index)
            .map_or_else(|| format!("#{index}"), |taxon| taxon.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::taxon::Taxon;
    use crate::core::types::IdOrigin;

    fn tree() -> TaxonTree {
        let mut tree = TaxonTree::new();
        tree.insert(Taxon {
            id: Some(TaxonId::from("tx1")),
            name: "Fungi".to_string(),
            rank: None,
            parent: None,
            origin: IdOrigin::Synthetic,
        })
        .unwrap();
        tree.insert(Taxon {
            id: Some(TaxonId::from("tx2")),
            name: "Ascomycota".to_string(),
            rank: None,
            parent: Some(0),
            origin: IdOrigin::Synthetic,
        })
        .unwrap();
        tree
    }

    fn draft(id: Option<&str>, habitat: Option<&str>) -> ItemDraft {
        let mut draft = ItemDraft {
            item_id: id.map(str::to_string),
            ..ItemDraft::default()
        };
        if let Some(habitat) = habitat {
            draft
                .taxon_info
                .insert("habitat".to_string(), habitat.to_string());
        }
        draft
    }

    #[test]
    fn test_synthetic_item_ids_skip_explicit_ones() {
        let tree = tree();
        let binder = ItemBinder::new(&tree);
        let tables = binder
            .bind(
                vec![draft(None, None), draft(Some("1"), None), draft(None, None)],
                &[Some(1), Some(1), None],
            )
            .unwrap();

        let ids: Vec<&str> = tables.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, ["2", "1", "3"]);
        assert_eq!(tables.items[2].taxon, None);
    }

    #[test]
    fn test_agreeing_taxon_info_is_recorded_once() {
        let tree = tree();
        let binder = ItemBinder::new(&tree);
        let tables = binder
            .bind(
                vec![draft(None, Some("soil")), draft(None, Some("soil"))],
                &[Some(1), Some(1)],
            )
            .unwrap();
        assert_eq!(tables.taxon_info[&1]["habitat"], "soil");

        let rows = tables.taxon_rows(&tree);
        assert_eq!(rows[1].metadata["habitat"], "soil");
        assert!(rows[0].metadata.is_empty());
    }

    #[test]
    fn test_conflicting_taxon_info_names_column_and_taxon() {
        let tree = tree();
        let binder = ItemBinder::new(&tree);
        let err = binder
            .bind(
                vec![draft(None, Some("soil")), draft(None, Some("marine"))],
                &[Some(1), Some(1)],
            )
            .unwrap_err();
        assert_eq!(
            err,
            ConsistencyError::ConflictingValue {
                column: "habitat".to_string(),
                taxon: "Ascomycota (tx2)".to_string(),
                first: "soil".to_string(),
                second: "marine".to_string(),
            }
        );
    }

    #[test]
    fn test_different_taxa_may_disagree() {
        let tree = tree();
        let binder = ItemBinder::new(&tree);
        assert!(binder
            .bind(
                vec![draft(None, Some("soil")), draft(None, Some("marine"))],
                &[Some(0), Some(1)],
            )
            .is_ok());
    }

    #[test]
    fn test_duplicate_item_ids_are_rejected() {
        let tree = tree();
        let binder = ItemBinder::new(&tree);
        let err = binder
            .bind(
                vec![draft(Some("AB1"), None), draft(Some("AB1"), None)],
                &[Some(0), Some(1)],
            )
            .unwrap_err();
        assert_eq!(err, ConsistencyError::DuplicateItemId("AB1".to_string()));
    }

    #[test]
    fn test_length_mismatch() {
        let tree = tree();
        let binder = ItemBinder::new(&tree);
        assert!(matches!(
            binder.bind(vec![draft(None, None)], &[]),
            Err(ConsistencyError::LengthMismatch { items: 1, leaves: 0 })
        ));
    }

    #[test]
    fn test_item_rows_carry_taxon_ids() {
        let tree = tree();
        let binder = ItemBinder::new(&tree);
        let tables = binder
            .bind(vec![draft(Some("AB1"), None)], &[Some(1)])
            .unwrap();
        let rows = tables.item_rows(&tree);
        assert_eq!(rows[0].taxon_id, Some(TaxonId::from("tx2")));
        assert_eq!(rows[0].taxon_index, Some(1));
    }
}
