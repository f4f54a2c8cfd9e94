//! Extraction of semantic fields from one input record.
//!
//! A capture specification says how to cut a record into fragments and what each
//! fragment means. Two layouts are supported:
//!
//! - **Regex**: one role per capture group, e.g. `^(\S+) (.+)$` with roles
//!   `item_id, lineage` for FASTA headers such as `AB1234 Fungi;Ascomycota`
//! - **Fields**: one role per delimited field, e.g. a TSV row `id<TAB>lineage<TAB>habitat`

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use crate::error::{ConfigurationError, ParseError};
use crate::parsing::input::LabeledText;
use crate::utils::validation::validate_separator;

/// Meaning of one captured fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TaxonId,
    TaxonName,
    Lineage,
    ItemId,
    ItemName,
    /// Item-scoped metadata column
    ItemInfo(String),
    /// Taxon-scoped metadata column; must agree across items of one taxon
    TaxonInfo(String),
    /// Captured but unused
    Ignore,
}

impl FromStr for Role {
    type Err = ConfigurationError;

    /// Accepts `taxon_id`, `taxon_name`, `lineage`, `item_id`, `item_name`,
    /// `item_info:<column>`, `taxon_info:<column>` and `ignore` (or `_`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(column) = s.strip_prefix("item_info:") {
            return Ok(Self::ItemInfo(column.to_string()));
        }
        if let Some(column) = s.strip_prefix("taxon_info:") {
            return Ok(Self::TaxonInfo(column.to_string()));
        }
        match s {
            "taxon_id" => Ok(Self::TaxonId),
            "taxon_name" => Ok(Self::TaxonName),
            "lineage" | "class" => Ok(Self::Lineage),
            "item_id" => Ok(Self::ItemId),
            "item_name" => Ok(Self::ItemName),
            "ignore" | "_" => Ok(Self::Ignore),
            _ => Err(ConfigurationError::InvalidRoles(format!("unknown role '{s}'"))),
        }
    }
}

/// Parse a comma-separated role list such as `item_id,lineage,taxon_info:habitat`
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidRoles` for unknown role names.
pub fn parse_roles(list: &str) -> Result<Vec<Role>, ConfigurationError> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// How to cut a record into fragments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureSpec {
    Regex { pattern: String, roles: Vec<Role> },
    Fields { separator: String, roles: Vec<Role> },
}

impl Default for CaptureSpec {
    /// The whole record is one classification string
    fn default() -> Self {
        Self::Fields {
            separator: "\t".to_string(),
            roles: vec![Role::Lineage],
        }
    }
}

impl CaptureSpec {
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        match self {
            Self::Regex { roles, .. } | Self::Fields { roles, .. } => roles,
        }
    }

    /// Names of the declared taxon-scoped columns
    #[must_use]
    pub fn taxon_columns(&self) -> Vec<String> {
        self.roles()
            .iter()
            .filter_map(|role| match role {
                Role::TaxonInfo(column) => Some(column.clone()),
                _ => None,
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the role mapping is unusable, the pattern
    /// does not compile or has the wrong number of groups, or the separator is empty.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_roles(self.roles())?;
        match self {
            Self::Regex { pattern, roles } => {
                let regex = compile(pattern)?;
                let groups = regex.captures_len() - 1;
                if groups != roles.len() {
                    return Err(ConfigurationError::InvalidPattern(format!(
                        "pattern has {groups} capture groups but {} roles were given",
                        roles.len()
                    )));
                }
            }
            Self::Fields { separator, .. } => validate_separator("field separator", separator)?,
        }
        Ok(())
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigurationError> {
    Regex::new(pattern).map_err(|e| ConfigurationError::InvalidPattern(e.to_string()))
}

fn validate_roles(roles: &[Role]) -> Result<(), ConfigurationError> {
    if roles.is_empty() {
        return Err(ConfigurationError::InvalidRoles("no roles given".to_string()));
    }

    let mut seen: HashSet<&Role> = HashSet::new();
    for role in roles {
        match role {
            Role::Ignore => continue,
            Role::ItemInfo(column) | Role::TaxonInfo(column) if column.trim().is_empty() => {
                return Err(ConfigurationError::InvalidRoles(
                    "metadata columns need a name".to_string(),
                ));
            }
            _ => {}
        }
        if !seen.insert(role) {
            return Err(ConfigurationError::InvalidRoles(format!(
                "role {role:?} appears more than once"
            )));
        }
    }

    let locates_taxon = roles.iter().any(|role| {
        matches!(
            role,
            Role::TaxonId | Role::TaxonName | Role::Lineage | Role::ItemId
        )
    });
    if !locates_taxon {
        return Err(ConfigurationError::InvalidRoles(
            "one of taxon_id, taxon_name, lineage or item_id is required".to_string(),
        ));
    }

    Ok(())
}

/// How a record's taxon is located, in precedence order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    TaxonId(String),
    Lineage(String),
    TaxonName(String),
    ItemId(String),
}

/// Semantic fields of one record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Position of the record in its batch
    pub index: usize,
    pub taxon_id: Option<String>,
    pub taxon_name: Option<String>,
    pub lineage: Option<String>,
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    pub item_info: BTreeMap<String, String>,
    pub taxon_info: BTreeMap<String, String>,
}

impl ParsedRecord {
    /// Pick the most specific way of locating this record's taxon:
    /// taxon ID, then lineage, then taxon name, then item ID.
    #[must_use]
    pub fn locator(&self) -> Option<Locator> {
        if let Some(id) = &self.taxon_id {
            return Some(Locator::TaxonId(id.clone()));
        }
        if let Some(lineage) = &self.lineage {
            return Some(Locator::Lineage(lineage.clone()));
        }
        if let Some(name) = &self.taxon_name {
            return Some(Locator::TaxonName(name.clone()));
        }
        self.item_id.clone().map(Locator::ItemId)
    }

    fn assign(&mut self, role: &Role, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let value = value.to_string();
        match role {
            Role::TaxonId => self.taxon_id = Some(value),
            Role::TaxonName => self.taxon_name = Some(value),
            Role::Lineage => self.lineage = Some(value),
            Role::ItemId => self.item_id = Some(value),
            Role::ItemName => self.item_name = Some(value),
            Role::ItemInfo(column) => {
                self.item_info.insert(column.clone(), value);
            }
            Role::TaxonInfo(column) => {
                self.taxon_info.insert(column.clone(), value);
            }
            Role::Ignore => {}
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    Fields(String),
}

/// Applies a validated capture specification to records
#[derive(Debug, Clone)]
pub struct RecordParser {
    matcher: Matcher,
    roles: Vec<Role>,
}

impl RecordParser {
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the pattern or role mapping is unusable.
    pub fn new(spec: &CaptureSpec) -> Result<Self, ConfigurationError> {
        spec.validate()?;
        let matcher = match spec {
            CaptureSpec::Regex { pattern, .. } => Matcher::Regex(compile(pattern)?),
            CaptureSpec::Fields { separator, .. } => Matcher::Fields(separator.clone()),
        };
        Ok(Self {
            matcher,
            roles: spec.roles().to_vec(),
        })
    }

    /// Parse one record
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Record` if the record does not match the pattern or has
    /// fewer fields than roles.
    pub fn parse(&self, index: usize, record: &LabeledText) -> Result<ParsedRecord, ParseError> {
        let mut parsed = ParsedRecord {
            index,
            item_info: record.metadata.clone(),
            ..ParsedRecord::default()
        };
        let text = record.text.trim_end_matches(['\r', '\n']);

        match &self.matcher {
            Matcher::Regex(regex) => {
                let captures = regex.captures(text).ok_or_else(|| ParseError::Record {
                    record: index,
                    message: format!("'{text}' does not match the capture pattern"),
                })?;
                for (role, group) in self.roles.iter().zip(captures.iter().skip(1)) {
                    if let Some(group) = group {
                        parsed.assign(role, group.as_str());
                    }
                }
            }
            Matcher::Fields(separator) => {
                let fields: Vec<&str> = text.split(separator.as_str()).collect();
                if fields.len() < self.roles.len() {
                    return Err(ParseError::Record {
                        record: index,
                        message: format!(
                            "expected {} fields, found {}",
                            self.roles.len(),
                            fields.len()
                        ),
                    });
                }
                for (role, field) in self.roles.iter().zip(fields) {
                    parsed.assign(role, field);
                }
            }
        }

        if parsed.locator().is_none() {
            return Err(ParseError::Record {
                record: index,
                message: "no taxon ID, lineage, taxon name or item ID captured".to_string(),
            });
        }

        Ok(parsed)
    }

    /// Parse a batch in parallel, preserving input order.
    ///
    /// # Errors
    ///
    /// Only in strict mode: the first per-record `ParseError`.
    pub fn parse_all(
        &self,
        records: &[LabeledText],
        strict: bool,
    ) -> Result<Vec<Result<ParsedRecord, ParseError>>, ParseError> {
        let results: Vec<_> = records
            .par_iter()
            .enumerate()
            .map(|(index, record)| self.parse(index, record))
            .collect();

        if strict {
            let mut checked = Vec::with_capacity(results.len());
            for result in results {
                checked.push(Ok(result?));
            }
            return Ok(checked);
        }

        Ok(results)
    }
}
