//! End-to-end tests of record classification, merging and tree queries.

use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use lineage_solver::config::PipelineConfig;
use lineage_solver::core::taxon::TaxonDescriptor;
use lineage_solver::core::types::{ArbitraryIdPolicy, IdOrigin, ReturnMode, TaxonId, TaxonKey};
use lineage_solver::error::{ConsistencyError, LineageError, LookupError};
use lineage_solver::parsing::input::LabeledText;
use lineage_solver::parsing::record::{CaptureSpec, Role};
use lineage_solver::pipeline::classify::{Classification, Classifier, FailureStage};
use lineage_solver::resolver::null::NullResolver;
use lineage_solver::resolver::{IdResolver, Resolution, ResolvedTaxon, ResolverKind, ResolverSettings};
use lineage_solver::tree::registry::{RegistryOptions, TaxonRegistry};
use lineage_solver::tree::store::TaxonTree;
use lineage_solver::tree::traversal::{
    QueryOutcome, Recursion, SubtaxaOptions, SubtaxaResult, SupertaxaOptions, TraversalEngine,
};

fn config(policy: ArbitraryIdPolicy, roles: Vec<Role>) -> PipelineConfig {
    PipelineConfig {
        capture: CaptureSpec::Fields {
            separator: "\t".to_string(),
            roles,
        },
        policy,
        ..PipelineConfig::default()
    }
}

fn classify_offline(policy: ArbitraryIdPolicy, roles: Vec<Role>, lines: &[&str]) -> Classification {
    Classifier::new(config(policy, roles), Box::new(NullResolver))
        .unwrap()
        .classify(&labeled(lines))
        .unwrap()
}

fn labeled(lines: &[&str]) -> Vec<LabeledText> {
    lines.iter().map(|line| LabeledText::new(*line)).collect()
}

fn slot(tree: &TaxonTree, name: &str) -> usize {
    tree.taxa()
        .iter()
        .position(|taxon| taxon.name == name)
        .unwrap_or_else(|| panic!("{name} is not in the tree"))
}

fn names(tree: &TaxonTree, keys: &[TaxonKey]) -> Vec<String> {
    keys.iter()
        .map(|key| tree.get(tree.resolve(key).unwrap()).unwrap().name.clone())
        .collect()
}

// ============================================================================
// Worked scenarios
// ============================================================================

#[test]
fn test_two_lineages_share_one_root() {
    let result = classify_offline(
        ArbitraryIdPolicy::Allow,
        vec![Role::Lineage],
        &[
            "Fungi;Ascomycota;Saccharomycetes",
            "Fungi;Basidiomycota;Agaricomycetes",
        ],
    );
    let tree = &result.tree;
    let engine = TraversalEngine::new(tree);

    assert_eq!(tree.len(), 5);
    assert_eq!(names(tree, &engine.roots(ReturnMode::Id)), vec!["Fungi"]);

    let fungi = slot(tree, "Fungi");
    let children: Vec<&str> = tree
        .children_of(Some(fungi))
        .iter()
        .map(|&child| tree.get(child).unwrap().name.as_str())
        .collect();
    assert_eq!(children, vec!["Ascomycota", "Basidiomycota"]);
    for child in tree.children_of(Some(fungi)) {
        assert_eq!(tree.children_of(Some(*child)).len(), 1);
    }

    let SubtaxaResult::Simplified { taxa, missing } = engine.subtaxa(
        &[TaxonKey::Index(fungi)],
        &SubtaxaOptions {
            recursion: Recursion::Full,
            simplify: true,
            ..SubtaxaOptions::default()
        },
    ) else {
        panic!("expected a simplified result");
    };
    assert!(missing.is_empty());
    let found: HashSet<String> = names(tree, &taxa).into_iter().collect();
    let expected: HashSet<String> = ["Ascomycota", "Saccharomycetes", "Basidiomycota", "Agaricomycetes"]
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn test_items_bind_to_shared_leaf_and_new_branch_reuses_ancestors() {
    let result = classify_offline(
        ArbitraryIdPolicy::Allow,
        vec![Role::ItemId, Role::Lineage],
        &[
            "a\tFungi;Ascomycota;Saccharomycetes",
            "b\tFungi;Ascomycota;Saccharomycetes",
        ],
    );
    let items = &result.tables.items;
    assert_eq!(items[0].taxon, items[1].taxon);
    assert_eq!(items[0].taxon, Some(slot(&result.tree, "Saccharomycetes")));
    assert_eq!(result.tree.len(), 3);

    let extended = classify_offline(
        ArbitraryIdPolicy::Allow,
        vec![Role::ItemId, Role::Lineage],
        &[
            "a\tFungi;Ascomycota;Saccharomycetes",
            "b\tFungi;Ascomycota;Saccharomycetes",
            "c\tFungi;Ascomycota;Sordariomycetes",
        ],
    );
    assert_eq!(extended.tree.len(), 4);
    assert_eq!(extended.report.taxa_created, 4);

    let tree = &extended.tree;
    let sordario = slot(tree, "Sordariomycetes");
    assert_eq!(tree.parent_of(sordario), Some(slot(tree, "Ascomycota")));
    assert_eq!(extended.tables.items[2].taxon, Some(sordario));
}

#[test]
fn test_merge_reports_one_created_taxon_for_new_branch() {
    let mut registry = TaxonRegistry::new(RegistryOptions::default());
    let lineage = |names: &[&str]| -> Vec<TaxonDescriptor> {
        names.iter().map(|name| TaxonDescriptor::new(*name)).collect()
    };

    let first = registry
        .merge(&lineage(&["Fungi", "Ascomycota", "Saccharomycetes"]))
        .unwrap();
    let second = registry
        .merge(&lineage(&["Fungi", "Ascomycota", "Saccharomycetes"]))
        .unwrap();
    let third = registry
        .merge(&lineage(&["Fungi", "Ascomycota", "Sordariomycetes"]))
        .unwrap();

    assert_eq!(first.created, 3);
    assert_eq!(second.created, 0);
    assert_eq!(second.leaf, first.leaf);
    assert_eq!(third.created, 1);
    assert_eq!(third.path[..2], first.path[..2]);
}

#[test]
fn test_conflicting_taxon_column_names_column_and_taxon() {
    let classifier = Classifier::new(
        config(
            ArbitraryIdPolicy::Allow,
            vec![
                Role::ItemId,
                Role::Lineage,
                Role::TaxonInfo("habitat".to_string()),
            ],
        ),
        Box::new(NullResolver),
    )
    .unwrap();

    let err = classifier
        .classify(&labeled(&[
            "a\tFungi;Ascomycota\tsoil",
            "b\tFungi;Ascomycota\tmarine",
        ]))
        .unwrap_err();

    match err {
        LineageError::Consistency(ConsistencyError::ConflictingValue { column, taxon, .. }) => {
            assert_eq!(column, "habitat");
            assert!(taxon.contains("Ascomycota"), "unexpected taxon {taxon}");
        }
        other => panic!("expected a consistency error, got {other}"),
    }
}

#[test]
fn test_agreeing_taxon_column_is_attached_to_taxon_row() {
    let result = classify_offline(
        ArbitraryIdPolicy::Allow,
        vec![
            Role::ItemId,
            Role::Lineage,
            Role::TaxonInfo("habitat".to_string()),
        ],
        &["a\tFungi;Ascomycota\tsoil", "b\tFungi;Ascomycota\tsoil"],
    );

    let rows = result.taxon_rows();
    let ascomycota = slot(&result.tree, "Ascomycota");
    assert_eq!(
        rows[ascomycota].metadata.get("habitat").map(String::as_str),
        Some("soil")
    );
    assert!(rows[slot(&result.tree, "Fungi")].metadata.is_empty());
}

#[test]
fn test_ranked_lineages_with_abbreviations() {
    let mut config = config(ArbitraryIdPolicy::Allow, vec![Role::ItemId, Role::Lineage]);
    config.lineage.rank_separator = Some("__".to_string());
    config.lineage.normalize_ranks = true;

    let result = Classifier::new(config, Box::new(NullResolver))
        .unwrap()
        .classify(&labeled(&[
            "otu1\tk__Fungi;p__Ascomycota;c__",
            "otu2\tk__Fungi;p__Basidiomycota",
        ]))
        .unwrap();

    let tree = &result.tree;
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.get(slot(tree, "Fungi")).unwrap().rank.as_deref(), Some("kingdom"));
    assert_eq!(
        tree.get(slot(tree, "Ascomycota")).unwrap().rank.as_deref(),
        Some("phylum")
    );
    assert_eq!(result.tables.items[0].taxon, Some(slot(tree, "Ascomycota")));
}

// ============================================================================
// Tree properties
// ============================================================================

fn sample_tree() -> TaxonTree {
    classify_offline(
        ArbitraryIdPolicy::Allow,
        vec![Role::Lineage],
        &[
            "Fungi;Ascomycota;Saccharomycetes;Saccharomycetales",
            "Fungi;Ascomycota;Sordariomycetes",
            "Fungi;Basidiomycota;Agaricomycetes",
            "Bacteria;Proteobacteria",
        ],
    )
    .tree
}

#[test]
fn test_supertaxa_and_subtaxa_are_inverse() {
    let tree = sample_tree();
    let engine = TraversalEngine::new(&tree);
    let up = SupertaxaOptions {
        recursion: Recursion::Full,
        return_mode: ReturnMode::Index,
        ..SupertaxaOptions::default()
    };
    let down = SubtaxaOptions {
        recursion: Recursion::Full,
        return_mode: ReturnMode::Index,
        ..SubtaxaOptions::default()
    };

    let found = |outcome: &QueryOutcome| -> Vec<TaxonKey> {
        match outcome {
            QueryOutcome::Found(keys) => keys.clone(),
            QueryOutcome::Missing => panic!("every slot is in the tree"),
        }
    };

    for x in 0..tree.len() {
        let ancestors = found(&engine.supertaxa(&[TaxonKey::Index(x)], &up)[0].outcome);
        for y in 0..tree.len() {
            let SubtaxaResult::PerKey(results) = engine.subtaxa(&[TaxonKey::Index(y)], &down) else {
                panic!("expected per-key results");
            };
            let descendants = found(&results[0].outcome);
            assert_eq!(
                ancestors.contains(&TaxonKey::Index(y)),
                descendants.contains(&TaxonKey::Index(x)),
                "slots {x} and {y}"
            );
        }
    }
}

#[test]
fn test_every_taxon_reaches_a_root() {
    let tree = sample_tree();
    tree.validate().unwrap();

    let roots: HashSet<usize> = tree.roots().iter().copied().collect();
    for index in 0..tree.len() {
        let lineage = tree.lineage(index).unwrap();
        assert!(lineage.len() <= tree.len());
        assert!(roots.contains(&lineage[0]));
        assert_eq!(lineage.last(), Some(&index));
    }
}

#[test]
fn test_merging_twice_leaves_tree_unchanged() {
    let lineages = [
        vec![
            TaxonDescriptor::new("Fungi").with_rank("kingdom"),
            TaxonDescriptor::new("Ascomycota").with_rank("phylum"),
        ],
        vec![
            TaxonDescriptor::new("Fungi").with_rank("kingdom"),
            TaxonDescriptor::new("Basidiomycota").with_rank("phylum"),
        ],
    ];
    let mut registry = TaxonRegistry::new(RegistryOptions::default());
    for lineage in &lineages {
        registry.merge(lineage).unwrap();
    }
    let size = registry.tree().len();
    let signature = registry.tree().topology_signature();
    let ids: Vec<Option<TaxonId>> = registry.tree().taxa().iter().map(|t| t.id.clone()).collect();

    for lineage in &lineages {
        assert_eq!(registry.merge(lineage).unwrap().created, 0);
    }

    assert_eq!(registry.tree().len(), size);
    assert_eq!(registry.tree().topology_signature(), signature);
    let after: Vec<Option<TaxonId>> = registry.tree().taxa().iter().map(|t| t.id.clone()).collect();
    assert_eq!(after, ids);
}

#[test]
fn test_distinct_ids_with_same_name_stay_distinct() {
    let mut registry = TaxonRegistry::new(RegistryOptions::default());
    let fungi = TaxonDescriptor::new("Fungi").with_id("4751", IdOrigin::Resolved);

    let first = registry
        .merge(&[
            fungi.clone(),
            TaxonDescriptor::new("Candida")
                .with_rank("genus")
                .with_id("5475", IdOrigin::Resolved),
        ])
        .unwrap();
    let second = registry
        .merge(&[
            fungi,
            TaxonDescriptor::new("Candida")
                .with_rank("genus")
                .with_id("1535326", IdOrigin::Resolved),
        ])
        .unwrap();

    assert_eq!(registry.tree().len(), 3);
    assert_eq!(first.path[0], second.path[0]);
    assert_ne!(first.leaf, second.leaf);
}

#[test]
fn test_policy_does_not_change_topology() {
    let lines = [
        "Fungi;Ascomycota;Saccharomycetes",
        "Fungi;Ascomycota;Sordariomycetes",
        "Fungi;Basidiomycota",
        "Bacteria",
    ];
    let allow = classify_offline(ArbitraryIdPolicy::Allow, vec![Role::Lineage], &lines);
    let na = classify_offline(ArbitraryIdPolicy::Na, vec![Role::Lineage], &lines);

    assert_eq!(allow.tree.len(), na.tree.len());
    assert_eq!(
        allow.tree.topology_signature(),
        na.tree.topology_signature()
    );
    assert!(allow.tree.taxa().iter().all(|taxon| taxon.id.is_some()));
    assert!(na.tree.taxa().iter().all(|taxon| taxon.id.is_none()));
}

#[test]
fn test_error_policy_rejects_unresolvable_taxa() {
    let classifier = Classifier::new(
        config(ArbitraryIdPolicy::Error, vec![Role::Lineage]),
        Box::new(NullResolver),
    )
    .unwrap();

    assert!(matches!(
        classifier.classify(&labeled(&["Fungi;Ascomycota"])),
        Err(LineageError::Lookup(LookupError::ArbitraryId(_)))
    ));
}

// ============================================================================
// Resolver batching
// ============================================================================

/// Answers from a fixed two-genus taxonomy and records every call
#[derive(Default)]
struct CountingResolver {
    name_calls: AtomicUsize,
    lineage_calls: AtomicUsize,
    item_calls: AtomicUsize,
    batches: Mutex<Vec<usize>>,
}

impl CountingResolver {
    fn lineage_of(id: &TaxonId) -> Option<Vec<ResolvedTaxon>> {
        let fungi = ResolvedTaxon {
            id: TaxonId::from("4751"),
            name: "Fungi".to_string(),
            rank: Some("kingdom".to_string()),
        };
        let genus = |id: &str, name: &str| ResolvedTaxon {
            id: TaxonId::from(id),
            name: name.to_string(),
            rank: Some("genus".to_string()),
        };
        match id.as_str() {
            "4930" => Some(vec![fungi, genus("4930", "Saccharomyces")]),
            "5475" => Some(vec![fungi, genus("5475", "Candida")]),
            _ => None,
        }
    }
}

impl IdResolver for CountingResolver {
    fn name(&self) -> &str {
        "counting"
    }

    fn resolve_by_name(&self, names: &[String]) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(names.len());
        Ok(names
            .iter()
            .map(|name| match name.as_str() {
                "Saccharomyces" => Resolution::Found(TaxonId::from("4930")),
                "Candida" => Resolution::Found(TaxonId::from("5475")),
                _ => Resolution::NotFound,
            })
            .collect())
    }

    fn resolve_lineage(
        &self,
        ids: &[TaxonId],
    ) -> Result<Vec<Resolution<Vec<ResolvedTaxon>>>, LookupError> {
        self.lineage_calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(ids.len());
        Ok(ids
            .iter()
            .map(|id| Self::lineage_of(id).map_or(Resolution::NotFound, Resolution::Found))
            .collect())
    }

    fn resolve_id_from_item_id(
        &self,
        item_ids: &[String],
    ) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Resolution::NotFound; item_ids.len()])
    }
}

#[test]
fn test_each_distinct_name_is_resolved_once() {
    let resolver = std::sync::Arc::new(CountingResolver::default());

    struct Shared(std::sync::Arc<CountingResolver>);
    impl IdResolver for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn resolve_by_name(&self, names: &[String]) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
            self.0.resolve_by_name(names)
        }
        fn resolve_lineage(
            &self,
            ids: &[TaxonId],
        ) -> Result<Vec<Resolution<Vec<ResolvedTaxon>>>, LookupError> {
            self.0.resolve_lineage(ids)
        }
        fn resolve_id_from_item_id(
            &self,
            item_ids: &[String],
        ) -> Result<Vec<Resolution<TaxonId>>, LookupError> {
            self.0.resolve_id_from_item_id(item_ids)
        }
    }

    let classifier = Classifier::new(
        config(ArbitraryIdPolicy::Error, vec![Role::ItemId, Role::TaxonName]),
        Box::new(Shared(resolver.clone())),
    )
    .unwrap();
    let result = classifier
        .classify(&labeled(&[
            "s1\tSaccharomyces",
            "s2\tCandida",
            "s3\tSaccharomyces",
            "s4\tSaccharomyces",
        ]))
        .unwrap();

    assert_eq!(resolver.name_calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.lineage_calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.item_calls.load(Ordering::SeqCst), 0);
    assert_eq!(*resolver.batches.lock().unwrap(), vec![2, 2]);

    let tree = &result.tree;
    assert_eq!(tree.len(), 3);
    assert!(tree
        .taxa()
        .iter()
        .all(|taxon| taxon.origin == IdOrigin::Resolved));
    assert_eq!(result.tables.items[0].taxon, result.tables.items[3].taxon);
    assert_eq!(
        tree.get(result.tables.items[1].taxon.unwrap()).unwrap().id,
        Some(TaxonId::from("5475"))
    );
}

const TABLE: &str = r#"{
  "version": "1.0.0",
  "taxa": [
    { "id": "4751", "name": "Fungi", "rank": "kingdom" },
    { "id": "4890", "name": "Ascomycota", "rank": "phylum", "parent": "4751" },
    { "id": "5204", "name": "Basidiomycota", "rank": "phylum", "parent": "4751" }
  ],
  "items": { "AB1": "4890", "AB2": "4890", "CD7": "5204" }
}"#;

fn table_config(policy: ArbitraryIdPolicy, roles: Vec<Role>) -> (tempfile::NamedTempFile, PipelineConfig) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TABLE.as_bytes()).unwrap();

    let mut config = config(policy, roles);
    config.resolver = ResolverSettings {
        kind: ResolverKind::Table,
        table: Some(file.path().to_path_buf()),
        timeout_secs: None,
    };
    (file, config)
}

#[test]
fn test_table_resolver_places_items_by_accession() {
    let (_file, config) = table_config(ArbitraryIdPolicy::Allow, vec![Role::ItemId]);
    let result = Classifier::from_config(config)
        .unwrap()
        .classify(&labeled(&["AB1", "AB2", "ZZ9", "CD7"]))
        .unwrap();

    let tree = &result.tree;
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.roots().len(), 1);

    let items = &result.tables.items;
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].taxon, items[1].taxon);
    assert_eq!(
        tree.get(items[0].taxon.unwrap()).unwrap().id,
        Some(TaxonId::from("4890"))
    );
    assert_eq!(items[2].item_id, "ZZ9");
    assert_eq!(items[2].taxon, None);

    assert_eq!(result.report.bound, 3);
    assert_eq!(result.report.unbound, 1);
    assert_eq!(result.report.failures.len(), 1);
    assert_eq!(result.report.failures[0].record, 2);
    assert_eq!(result.report.failures[0].stage, FailureStage::Lookup);
}

#[test]
fn test_table_resolver_confirms_input_ids() {
    let (_file, config) = table_config(ArbitraryIdPolicy::Error, vec![Role::TaxonId, Role::ItemId]);
    let result = Classifier::from_config(config)
        .unwrap()
        .classify(&labeled(&["5204\ts1", "4890\ts2"]))
        .unwrap();

    let tree = &result.tree;
    assert_eq!(tree.len(), 3);
    let engine = TraversalEngine::new(tree);
    assert_eq!(
        engine.classification(&TaxonKey::from("5204"), ";").as_deref(),
        Some("Fungi;Basidiomycota")
    );
    assert!(result.report.is_clean());
}

#[test]
fn test_input_id_precedes_lineage_text() {
    let (_file, config) = table_config(
        ArbitraryIdPolicy::Allow,
        vec![Role::ItemId, Role::TaxonId, Role::Lineage],
    );
    let result = Classifier::from_config(config)
        .unwrap()
        .classify(&labeled(&["s1\t4890\tSomething;Else"]))
        .unwrap();

    let leaf = result.tables.items[0].taxon.unwrap();
    assert_eq!(result.tree.get(leaf).unwrap().name, "Ascomycota");
    assert_eq!(result.tree.len(), 2);
}
