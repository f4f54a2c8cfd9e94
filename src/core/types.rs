use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Identifier of a taxon (canonical, synthetic or supplied by the input)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonId(pub String);

impl TaxonId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaxonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaxonId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a taxon's identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdOrigin {
    /// Returned by a resolver (canonical)
    Resolved,
    /// Generated locally because no canonical identifier was available
    Synthetic,
    /// Supplied by the input but never confirmed, or absent altogether
    Unresolved,
}

impl std::fmt::Display for IdOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::Synthetic => write!(f, "synthetic"),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// What to do when a taxon has to be created without a canonical identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(try_from = "String", into = "String")]
pub enum ArbitraryIdPolicy {
    /// Synthesize an unused identifier silently
    #[default]
    Allow,
    /// Synthesize an unused identifier and log a warning naming the taxon
    Warn,
    /// Abort the whole pass
    Error,
    /// Leave the identifier empty
    Na,
}

impl ArbitraryIdPolicy {
    /// Whether a lookup failure aborts the pass instead of being collected
    #[must_use]
    pub fn is_fail_fast(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl FromStr for ArbitraryIdPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "na" => Ok(Self::Na),
            _ => Err(ConfigurationError::UnsupportedPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for ArbitraryIdPolicy {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, ConfigurationError> {
        s.parse()
    }
}

impl From<ArbitraryIdPolicy> for String {
    fn from(policy: ArbitraryIdPolicy) -> Self {
        policy.to_string()
    }
}

impl std::fmt::Display for ArbitraryIdPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Na => write!(f, "na"),
        }
    }
}

/// How callers name a taxon in queries and how results name taxa.
///
/// `Index` addresses a slot in the taxon table and is the only way to refer to
/// taxa that carry no identifier (policy `na`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonKey {
    Id(TaxonId),
    Index(usize),
}

impl From<TaxonId> for TaxonKey {
    fn from(id: TaxonId) -> Self {
        Self::Id(id)
    }
}

impl From<usize> for TaxonKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for TaxonKey {
    fn from(id: &str) -> Self {
        Self::Id(TaxonId::from(id))
    }
}

/// `#12` parses as a table index, anything else as an identifier
impl FromStr for TaxonKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('#') {
            Some(index) => Ok(Self::Index(index.parse()?)),
            None => Ok(Self::Id(TaxonId::new(s))),
        }
    }
}

impl std::fmt::Display for TaxonKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Representation of taxa in query results.
///
/// `Id` reports identifiers and falls back to `TaxonKey::Index` for taxa without
/// one; `Index` always reports taxon table slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    #[default]
    Id,
    Index,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_str() {
        assert_eq!("allow".parse::<ArbitraryIdPolicy>(), Ok(ArbitraryIdPolicy::Allow));
        assert_eq!("WARN".parse::<ArbitraryIdPolicy>(), Ok(ArbitraryIdPolicy::Warn));
        assert_eq!(" na ".parse::<ArbitraryIdPolicy>(), Ok(ArbitraryIdPolicy::Na));
        assert_eq!(
            "sometimes".parse::<ArbitraryIdPolicy>(),
            Err(ConfigurationError::UnsupportedPolicy("sometimes".to_string()))
        );
    }

    #[test]
    fn test_policy_serde_rejects_unknown() {
        let policy: ArbitraryIdPolicy = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(policy, ArbitraryIdPolicy::Error);
        assert_eq!(serde_json::to_string(&policy).unwrap(), "\"error\"");

        let err = serde_json::from_str::<ArbitraryIdPolicy>("\"maybe\"").unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_policy_try_from_string() {
        assert_eq!(
            ArbitraryIdPolicy::try_from("error".to_string()),
            Ok(ArbitraryIdPolicy::Error)
        );
        assert_eq!(
            ArbitraryIdPolicy::try_from("never".to_string()),
            Err(ConfigurationError::UnsupportedPolicy("never".to_string()))
        );
        assert_eq!(String::from(ArbitraryIdPolicy::Na), "na");
    }

    #[test]
    fn test_taxon_key_parse_and_display() {
        assert_eq!("#3".parse::<TaxonKey>().unwrap(), TaxonKey::Index(3));
        assert_eq!("4751".parse::<TaxonKey>().unwrap(), TaxonKey::from("4751"));
        assert!("#x".parse::<TaxonKey>().is_err());
        assert_eq!(TaxonKey::Index(7).to_string(), "#7");
        assert_eq!(TaxonKey::from("tx1").to_string(), "tx1");
    }
}
