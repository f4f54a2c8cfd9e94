use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One input record bound to the leaf taxon of its lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Slot of the leaf taxon; `None` when the record could not be classified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon: Option<usize>,

    /// Item-scoped metadata columns
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Item {
    pub fn new(item_id: impl Into<String>, taxon: Option<usize>) -> Self {
        Self {
            item_id: item_id.into(),
            name: None,
            taxon,
            metadata: BTreeMap::new(),
        }
    }
}
