use serde::Serialize;
use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::core::taxon::TaxonDescriptor;
use crate::core::types::{ArbitraryIdPolicy, IdOrigin, TaxonId};
use crate::error::{ConfigurationError, LineageError, LookupError};
use crate::parsing::input::LabeledText;
use crate::parsing::lineage::LineageParser;
use crate::parsing::record::{Locator, ParsedRecord, RecordParser};
use crate::pipeline::binder::{BoundTables, ItemBinder, ItemDraft, ItemRow};
use crate::resolver::{resolve_distinct, IdResolver, Resolution, ResolvedTaxon};
use crate::tree::registry::TaxonRegistry;
use crate::tree::store::{TaxonRow, TaxonTree, TreeSnapshot};

/// Failures beyond this many are counted but not logged one by one
const MAX_LOGGED_FAILURES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Parse,
    Lookup,
    Merge,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::Lookup => write!(f, "lookup"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// A record that could not be bound to a taxon, or was placed by fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub record: usize,
    pub stage: FailureStage,
    pub message: String,
}

/// Per-record outcomes of one classification pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub records: usize,
    pub parsed: usize,
    pub bound: usize,
    pub unbound: usize,
    pub taxa_created: usize,
    /// Synthetic taxon IDs assigned with a warning under the `warn` policy
    pub warned_ids: usize,
    /// Records placed through a fallback after a lookup miss; they are still bound
    pub fallbacks: Vec<RecordFailure>,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    fn fail(&mut self, record: usize, stage: FailureStage, message: impl Into<String>) {
        self.failures.push(RecordFailure {
            record,
            stage,
            message: message.into(),
        });
    }

    fn fall_back(&mut self, record: usize, message: impl Into<String>) {
        self.fallbacks.push(RecordFailure {
            record,
            stage: FailureStage::Lookup,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Log the outcome once, after the whole batch
    pub fn log_summary(&self) {
        tracing::info!(
            records = self.records,
            bound = self.bound,
            unbound = self.unbound,
            taxa_created = self.taxa_created,
            fallbacks = self.fallbacks.len(),
            warned_ids = self.warned_ids,
            "Classification finished"
        );

        for fallback in self.fallbacks.iter().take(MAX_LOGGED_FAILURES) {
            tracing::info!(
                record = fallback.record,
                "Placed by fallback: {}",
                fallback.message
            );
        }

        if self.failures.is_empty() {
            return;
        }
        tracing::warn!(
            failures = self.failures.len(),
            "Some records could not be classified"
        );
        for failure in self.failures.iter().take(MAX_LOGGED_FAILURES) {
            tracing::warn!(
                record = failure.record,
                stage = %failure.stage,
                "{}",
                failure.message
            );
        }
        if self.failures.len() > MAX_LOGGED_FAILURES {
            tracing::warn!(
                "... and {} more failures",
                self.failures.len() - MAX_LOGGED_FAILURES
            );
        }
    }
}

/// Result of a classification pass
#[derive(Debug, Clone)]
pub struct Classification {
    pub tree: TaxonTree,
    pub tables: BoundTables,
    pub report: BatchReport,
}

impl Classification {
    #[must_use]
    pub fn taxon_rows(&self) -> Vec<TaxonRow> {
        self.tables.taxon_rows(&self.tree)
    }

    #[must_use]
    pub fn item_rows(&self) -> Vec<ItemRow> {
        self.tables.item_rows(&self.tree)
    }

    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot::new(
            &self.tree,
            self.tables.items.clone(),
            self.tables.taxon_info.clone(),
        )
    }
}

/// How one record will reach the registry
#[derive(Debug)]
enum Plan {
    Merge(Vec<TaxonDescriptor>),
    MergeResolved(Vec<ResolvedTaxon>),
    /// Waiting for a lineage lookup; `fallback` is merged on a miss, or the pass
    /// aborts when there is none
    ById {
        id: TaxonId,
        fallback: Option<Vec<TaxonDescriptor>>,
    },
    ByName(String),
    ByItem(String),
    Unbound,
}

/// Runs records through parsing, resolution, merging and binding
pub struct Classifier {
    config: PipelineConfig,
    records: RecordParser,
    lineages: LineageParser,
    resolver: Box<dyn IdResolver>,
}

impl Classifier {
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the configuration is invalid.
    pub fn new(
        config: PipelineConfig,
        resolver: Box<dyn IdResolver>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            records: RecordParser::new(&config.capture)?,
            lineages: LineageParser::new(config.lineage.clone())?,
            config,
            resolver,
        })
    }

    /// Build with the resolver the configuration selects
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError`, or an error loading the resolver's table.
    pub fn from_config(config: PipelineConfig) -> Result<Self, LineageError> {
        let resolver = config.resolver.build()?;
        Ok(Self::new(config, resolver)?)
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classify a batch of records into a new tree.
    ///
    /// Under the `error` policy the first lookup failure aborts the pass; under
    /// the other policies failures are collected into the report. Records that
    /// fail to parse are reported and left out of the item table.
    ///
    /// # Errors
    ///
    /// - `ParseError` in strict mode
    /// - `LookupError` under the `error` policy
    /// - `ConsistencyError` when items disagree on a taxon-scoped column
    /// - `CycleError` if the tree structure is violated
    pub fn classify(&self, input: &[LabeledText]) -> Result<Classification, LineageError> {
        let mut report = BatchReport {
            records: input.len(),
            ..BatchReport::default()
        };

        let mut records = Vec::with_capacity(input.len());
        for (index, result) in self
            .records
            .parse_all(input, self.config.strict)?
            .into_iter()
            .enumerate()
        {
            match result {
                Ok(record) => records.push(record),
                Err(e) => report.fail(index, FailureStage::Parse, e.to_string()),
            }
        }
        report.parsed = records.len();
        tracing::debug!(
            records = input.len(),
            parsed = records.len(),
            "Parsed records"
        );

        let mut plans = Vec::with_capacity(records.len());
        for record in &records {
            plans.push(self.plan(record, &mut report)?);
        }

        self.resolve_names(&records, &mut plans, &mut report)?;
        self.resolve_items(&records, &mut plans, &mut report)?;
        self.resolve_lineages(&records, &mut plans, &mut report)?;

        let fail_fast = self.config.policy.is_fail_fast();
        let mut registry = TaxonRegistry::new(self.config.registry_options());
        let mut leaves = Vec::with_capacity(records.len());
        for (plan, record) in plans.into_iter().zip(&records) {
            let merged = match plan {
                Plan::Merge(lineage) => registry.merge(&lineage),
                Plan::MergeResolved(lineage) => registry.merge_resolved(&lineage),
                _ => {
                    leaves.push(None);
                    continue;
                }
            };
            match merged {
                Ok(outcome) => leaves.push(Some(outcome.leaf)),
                Err(LineageError::Lookup(e)) if !fail_fast => {
                    report.fail(record.index, FailureStage::Merge, e.to_string());
                    leaves.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        report.taxa_created = registry.stats().created;
        report.warned_ids = registry.stats().warned;
        let tree = registry.into_tree();

        let drafts: Vec<ItemDraft> = records
            .into_iter()
            .map(|record| ItemDraft {
                item_id: record.item_id,
                name: record.item_name,
                item_info: record.item_info,
                taxon_info: record.taxon_info,
            })
            .collect();
        let tables = ItemBinder::new(&tree).bind(drafts, &leaves)?;

        report.bound = leaves.iter().flatten().count();
        report.unbound = report.parsed - report.bound;
        report.log_summary();

        Ok(Classification {
            tree,
            tables,
            report,
        })
    }

    fn plan(&self, record: &ParsedRecord, report: &mut BatchReport) -> Result<Plan, LineageError> {
        Ok(match record.locator() {
            Some(Locator::TaxonId(id)) => {
                let id = TaxonId::new(id);
                Plan::ById {
                    fallback: self.unconfirmed_lineage(&id, record),
                    id,
                }
            }
            Some(Locator::Lineage(text)) => match self.lineages.parse(&text) {
                Ok(lineage) => Plan::Merge(lineage),
                Err(e) if self.config.strict => return Err(e.into()),
                Err(e) => {
                    report.fail(record.index, FailureStage::Parse, e.to_string());
                    Plan::Unbound
                }
            },
            Some(Locator::TaxonName(name)) => Plan::ByName(name),
            Some(Locator::ItemId(item)) => Plan::ByItem(item),
            None => Plan::Unbound,
        })
    }

    /// Lineage to merge when an input or item-derived ID is unknown to the
    /// resolver; `None` under the `error` policy
    fn unconfirmed_lineage(&self, id: &TaxonId, record: &ParsedRecord) -> Option<Vec<TaxonDescriptor>> {
        let policy = self.config.policy;
        if policy.is_fail_fast() {
            return None;
        }

        let mut lineage = record
            .lineage
            .as_deref()
            .and_then(|text| self.lineages.parse(text).ok())
            .unwrap_or_else(|| {
                let name = record.taxon_name.clone().unwrap_or_else(|| id.to_string());
                vec![TaxonDescriptor::new(name)]
            });

        if policy != ArbitraryIdPolicy::Na {
            if let Some(leaf) = lineage.last_mut() {
                leaf.id = Some(id.clone());
                leaf.origin = IdOrigin::Unresolved;
            }
        }
        Some(lineage)
    }

    fn resolve_names(
        &self,
        records: &[ParsedRecord],
        plans: &mut [Plan],
        report: &mut BatchReport,
    ) -> Result<(), LineageError> {
        let names: Vec<String> = plans
            .iter()
            .filter_map(|plan| match plan {
                Plan::ByName(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        let Some(resolved) = self.batch(
            resolve_distinct(&names, |keys| self.resolver.resolve_by_name(keys)),
            records,
            plans,
            report,
            |plan| matches!(plan, Plan::ByName(_)),
        )?
        else {
            return Ok(());
        };

        for (plan, record) in plans.iter_mut().zip(records) {
            let Plan::ByName(name) = plan else { continue };
            let name = name.clone();
            *plan = match resolved.get(&name) {
                Some(Resolution::Found(id)) => Plan::ById {
                    fallback: Some(vec![
                        TaxonDescriptor::new(name.as_str()).with_id(id.as_str(), IdOrigin::Resolved)
                    ]),
                    id: id.clone(),
                },
                other => {
                    let error = lookup_miss(&name, other);
                    if self.config.policy.is_fail_fast() {
                        return Err(error.into());
                    }
                    if matches!(error, LookupError::Ambiguous { .. }) {
                        tracing::warn!(taxon = %name, "{error}, placing by name only");
                    }
                    report.fall_back(record.index, format!("{error}, placed by name only"));
                    Plan::Merge(vec![TaxonDescriptor::new(name)])
                }
            };
        }
        Ok(())
    }

    fn resolve_items(
        &self,
        records: &[ParsedRecord],
        plans: &mut [Plan],
        report: &mut BatchReport,
    ) -> Result<(), LineageError> {
        let items: Vec<String> = plans
            .iter()
            .filter_map(|plan| match plan {
                Plan::ByItem(item) => Some(item.clone()),
                _ => None,
            })
            .collect();
        let Some(resolved) = self.batch(
            resolve_distinct(&items, |keys| self.resolver.resolve_id_from_item_id(keys)),
            records,
            plans,
            report,
            |plan| matches!(plan, Plan::ByItem(_)),
        )?
        else {
            return Ok(());
        };

        for (plan, record) in plans.iter_mut().zip(records) {
            let Plan::ByItem(item) = plan else { continue };
            let item = item.clone();
            *plan = match resolved.get(&item) {
                Some(Resolution::Found(id)) => Plan::ById {
                    fallback: self.unconfirmed_lineage(id, record),
                    id: id.clone(),
                },
                other => {
                    let error = lookup_miss(&item, other);
                    if self.config.policy.is_fail_fast() {
                        return Err(error.into());
                    }
                    report.fail(record.index, FailureStage::Lookup, error.to_string());
                    Plan::Unbound
                }
            };
        }
        Ok(())
    }

    fn resolve_lineages(
        &self,
        records: &[ParsedRecord],
        plans: &mut [Plan],
        report: &mut BatchReport,
    ) -> Result<(), LineageError> {
        let ids: Vec<TaxonId> = plans
            .iter()
            .filter_map(|plan| match plan {
                Plan::ById { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect();
        let Some(resolved) = self.batch(
            resolve_distinct(&ids, |keys| self.resolver.resolve_lineage(keys)),
            records,
            plans,
            report,
            |plan| matches!(plan, Plan::ById { .. }),
        )?
        else {
            return Ok(());
        };

        for (plan, record) in plans.iter_mut().zip(records) {
            let Plan::ById { id, fallback } = plan else {
                continue;
            };
            let id = id.clone();
            let fallback = fallback.take();
            *plan = match resolved.get(&id) {
                Some(Resolution::Found(lineage)) if !lineage.is_empty() => {
                    Plan::MergeResolved(lineage.clone())
                }
                other => match fallback {
                    Some(lineage) => {
                        tracing::debug!(id = %id, "Lineage not resolved, using fallback");
                        let error = lookup_miss(id.as_str(), other);
                        report.fall_back(
                            record.index,
                            format!("{error}, placed without a confirmed lineage"),
                        );
                        Plan::Merge(lineage)
                    }
                    None => return Err(lookup_miss(id.as_str(), other).into()),
                },
            };
        }
        Ok(())
    }

    /// Apply the policy to a failed resolver batch: abort, or mark every record
    /// waiting on it as failed. Returns the resolutions when the batch succeeded.
    fn batch<K, T, P>(
        &self,
        result: Result<HashMap<K, Resolution<T>>, LookupError>,
        records: &[ParsedRecord],
        plans: &mut [Plan],
        report: &mut BatchReport,
        waiting: P,
    ) -> Result<Option<HashMap<K, Resolution<T>>>, LineageError>
    where
        P: Fn(&Plan) -> bool,
    {
        match result {
            Ok(resolved) => Ok(Some(resolved)),
            Err(e) if self.config.policy.is_fail_fast() => Err(e.into()),
            Err(e) => {
                tracing::warn!(resolver = self.resolver.name(), "Resolver batch failed: {e}");
                for (plan, record) in plans.iter_mut().zip(records) {
                    if waiting(plan) {
                        report.fail(record.index, FailureStage::Lookup, e.to_string());
                        *plan = Plan::Unbound;
                    }
                }
                Ok(None)
            }
        }
    }
}

fn lookup_miss<T>(key: &str, resolution: Option<&Resolution<T>>) -> LookupError {
    match resolution {
        Some(Resolution::Ambiguous(candidates)) => LookupError::Ambiguous {
            key: key.to_string(),
            candidates: candidates.clone(),
        },
        _ => LookupError::NotFound(key.to_string()),
    }
}
