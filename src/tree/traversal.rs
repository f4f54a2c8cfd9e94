use serde::Serialize;
use std::collections::{HashSet, VecDeque};

use crate::core::types::{ReturnMode, TaxonKey};
use crate::tree::store::TaxonTree;

/// How far a supertaxa or subtaxa query walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recursion {
    /// Parent or children only
    #[default]
    Immediate,
    /// All the way to the roots or leaves
    Full,
    /// At most this many levels
    Depth(usize),
}

impl Recursion {
    fn max_depth(self) -> Option<usize> {
        match self {
            Self::Immediate => Some(1),
            Self::Full => None,
            Self::Depth(n) => Some(n),
        }
    }

    fn allows(self, depth: usize) -> bool {
        self.max_depth().map_or(true, |max| depth <= max)
    }
}

impl From<bool> for Recursion {
    fn from(recursive: bool) -> Self {
        if recursive {
            Self::Full
        } else {
            Self::Immediate
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupertaxaOptions {
    pub recursion: Recursion,
    /// Put the queried taxon first in its result
    pub include_input: bool,
    pub return_mode: ReturnMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtaxaOptions {
    pub recursion: Recursion,
    /// Merge all results into one deduplicated collection
    pub simplify: bool,
    /// Put the queried taxon first in its result
    pub include_input: bool,
    pub return_mode: ReturnMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "taxa")]
pub enum QueryOutcome {
    Found(Vec<TaxonKey>),
    /// The key does not name a taxon of the tree
    Missing,
}

/// Result for one queried key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonQuery {
    pub key: TaxonKey,
    pub outcome: QueryOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaxaResult {
    PerKey(Vec<TaxonQuery>),
    /// Union of all results in first-occurrence order, plus keys not in the tree
    Simplified {
        taxa: Vec<TaxonKey>,
        missing: Vec<TaxonKey>,
    },
}

/// Read-only queries over a taxon tree
pub struct TraversalEngine<'a> {
    tree: &'a TaxonTree,
}

impl<'a> TraversalEngine<'a> {
    pub fn new(tree: &'a TaxonTree) -> Self {
        Self { tree }
    }

    /// Every taxon, in table order
    #[must_use]
    pub fn all(&self, mode: ReturnMode) -> Vec<TaxonKey> {
        (0..self.tree.len())
            .map(|index| self.tree.key_of(index, mode))
            .collect()
    }

    /// Taxa without a parent, in table order
    #[must_use]
    pub fn roots(&self, mode: ReturnMode) -> Vec<TaxonKey> {
        self.keys(self.tree.roots().iter().copied(), mode)
    }

    /// Ancestors of each key, nearest first; with full recursion the root is
    /// the last entry
    #[must_use]
    pub fn supertaxa(&self, subset: &[TaxonKey], options: &SupertaxaOptions) -> Vec<TaxonQuery> {
        self.per_key(subset, |index| {
            let mut found = Vec::new();
            if options.include_input {
                found.push(index);
            }
            found.extend(self.ancestors(index, options.recursion));
            self.keys(found, options.return_mode)
        })
    }

    /// Descendants of each key in breadth-first order
    #[must_use]
    pub fn subtaxa(&self, subset: &[TaxonKey], options: &SubtaxaOptions) -> SubtaxaResult {
        let per_key = self.per_key(subset, |index| {
            let mut found = Vec::new();
            if options.include_input {
                found.push(index);
            }
            found.extend(self.descendants(index, options.recursion));
            self.keys(found, options.return_mode)
        });

        if !options.simplify {
            return SubtaxaResult::PerKey(per_key);
        }

        let mut seen = HashSet::new();
        let mut taxa = Vec::new();
        let mut missing = Vec::new();
        for query in per_key {
            match query.outcome {
                QueryOutcome::Found(keys) => {
                    for key in keys {
                        if seen.insert(key.clone()) {
                            taxa.push(key);
                        }
                    }
                }
                QueryOutcome::Missing => missing.push(query.key),
            }
        }
        SubtaxaResult::Simplified { taxa, missing }
    }

    /// Leaf descendants of each key; a leaf is its own only leaf
    #[must_use]
    pub fn leaves(&self, subset: &[TaxonKey], mode: ReturnMode) -> Vec<TaxonQuery> {
        self.per_key(subset, |index| {
            let mut found = vec![index];
            found.extend(self.descendants(index, Recursion::Full));
            found.retain(|&slot| self.tree.children_of(Some(slot)).is_empty());
            self.keys(found, mode)
        })
    }

    /// Every taxon without children, in table order
    #[must_use]
    pub fn all_leaves(&self, mode: ReturnMode) -> Vec<TaxonKey> {
        let leaves = (0..self.tree.len()).filter(|&i| self.tree.children_of(Some(i)).is_empty());
        self.keys(leaves, mode)
    }

    /// `None` if the key is not in the tree
    #[must_use]
    pub fn is_root(&self, key: &TaxonKey) -> Option<bool> {
        let index = self.tree.resolve(key)?;
        Some(self.tree.parent_of(index).is_none())
    }

    #[must_use]
    pub fn is_leaf(&self, key: &TaxonKey) -> Option<bool> {
        let index = self.tree.resolve(key)?;
        Some(self.tree.children_of(Some(index)).is_empty())
    }

    /// Number of ancestors
    #[must_use]
    pub fn n_supertaxa(&self, key: &TaxonKey) -> Option<usize> {
        let index = self.tree.resolve(key)?;
        Some(self.ancestors(index, Recursion::Full).len())
    }

    #[must_use]
    pub fn n_subtaxa(&self, key: &TaxonKey, recursion: Recursion) -> Option<usize> {
        let index = self.tree.resolve(key)?;
        Some(self.descendants(index, recursion).len())
    }

    /// Root-first names joined by `separator`, e.g. `Fungi;Ascomycota`
    #[must_use]
    pub fn classification(&self, key: &TaxonKey, separator: &str) -> Option<String> {
        let index = self.tree.resolve(key)?;
        let mut chain = self.ancestors(index, Recursion::Full);
        chain.reverse();
        chain.push(index);
        let names: Vec<&str> = chain
            .into_iter()
            .filter_map(|slot| self.tree.get(slot).map(|t| t.name.as_str()))
            .collect();
        Some(names.join(separator))
    }

    fn per_key<F>(&self, subset: &[TaxonKey], query: F) -> Vec<TaxonQuery>
    where
        F: Fn(usize) -> Vec<TaxonKey>,
    {
        subset
            .iter()
            .map(|key| TaxonQuery {
                key: key.clone(),
                outcome: match self.tree.resolve(key) {
                    Some(index) => QueryOutcome::Found(query(index)),
                    None => QueryOutcome::Missing,
                },
            })
            .collect()
    }

    fn keys(&self, slots: impl IntoIterator<Item = usize>, mode: ReturnMode) -> Vec<TaxonKey> {
        slots
            .into_iter()
            .map(|index| self.tree.key_of(index, mode))
            .collect()
    }

    fn ancestors(&self, index: usize, recursion: Recursion) -> Vec<usize> {
        let mut found = Vec::new();
        let mut current = self.tree.parent_of(index);
        while let Some(parent) = current {
            if !recursion.allows(found.len() + 1) {
                break;
            }
            found.push(parent);
            current = self.tree.parent_of(parent);
        }
        found
    }

    fn descendants(&self, index: usize, recursion: Recursion) -> Vec<usize> {
        let mut found = Vec::new();
        let mut queue: VecDeque<(usize, usize)> = self
            .tree
            .children_of(Some(index))
            .iter()
            .map(|&child| (child, 1))
            .collect();

        while let Some((slot, depth)) = queue.pop_front() {
            if !recursion.allows(depth) {
                continue;
            }
            found.push(slot);
            queue.extend(
                self.tree
                    .children_of(Some(slot))
                    .iter()
                    .map(|&child| (child, depth + 1)),
            );
        }
        found
    }
}
