//! Parser for delimited classification strings.
//!
//! A classification string lists taxa from one end of a lineage to the other, e.g.
//! `Fungi;Ascomycota;Saccharomycetes` or `k__Fungi;p__Ascomycota;c__Saccharomycetes`.
//! Parsing always yields descriptors root-first, whatever the input convention.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::taxon::TaxonDescriptor;
use crate::error::{ConfigurationError, ParseError};
use crate::parsing::ranks::RankVocabulary;
use crate::utils::validation::validate_separator;

/// Delimiter layout of a classification string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageFormat {
    /// Separates taxa
    pub taxon_separator: String,

    /// Separates a rank token from a name token within one taxon, if ranks are present
    pub rank_separator: Option<String>,

    /// Input lists the most specific taxon first
    pub reverse_taxon_order: bool,

    /// Input writes `name<sep>rank` instead of `rank<sep>name`
    pub reverse_rank_order: bool,

    /// Map rank tokens through the embedded rank vocabulary (`k` -> `kingdom`)
    pub normalize_ranks: bool,

    /// Keep taxa with empty names (e.g. `g__` placeholders) instead of dropping them
    pub keep_empty_names: bool,
}

impl Default for LineageFormat {
    fn default() -> Self {
        Self {
            taxon_separator: ";".to_string(),
            rank_separator: None,
            reverse_taxon_order: false,
            reverse_rank_order: false,
            normalize_ranks: false,
            keep_empty_names: false,
        }
    }
}

impl LineageFormat {
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidSeparator` if a separator is empty, or if
    /// both separators are identical.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_separator("taxon separator", &self.taxon_separator)?;
        if let Some(rank_separator) = &self.rank_separator {
            validate_separator("rank separator", rank_separator)?;
            if rank_separator == &self.taxon_separator {
                return Err(ConfigurationError::InvalidSeparator(format!(
                    "taxon and rank separators are both '{rank_separator}'"
                )));
            }
        }
        Ok(())
    }
}

/// Turns classification strings into root-first descriptor sequences
#[derive(Debug, Clone)]
pub struct LineageParser {
    format: LineageFormat,
    vocabulary: Option<RankVocabulary>,
}

impl LineageParser {
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the format is invalid.
    pub fn new(format: LineageFormat) -> Result<Self, ConfigurationError> {
        format.validate()?;
        let vocabulary = if format.normalize_ranks {
            Some(RankVocabulary::load_embedded()?)
        } else {
            None
        };
        Ok(Self { format, vocabulary })
    }

    #[must_use]
    pub fn format(&self) -> &LineageFormat {
        &self.format
    }

    /// Parse one classification string
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Empty` for blank text, or `ParseError::NoTaxa` when no
    /// segment carries a name.
    pub fn parse(&self, text: &str) -> Result<Vec<TaxonDescriptor>, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut descriptors: Vec<TaxonDescriptor> = text
            .split(self.format.taxon_separator.as_str())
            .filter_map(|segment| self.parse_segment(segment))
            .collect();

        if descriptors.is_empty() {
            return Err(ParseError::NoTaxa(text.to_string()));
        }

        if self.format.reverse_taxon_order {
            descriptors.reverse();
        }

        Ok(descriptors)
    }

    /// Parse many classification strings in parallel, preserving input order.
    ///
    /// Each entry of the result holds that string's outcome. With `strict`, the
    /// first failure (in input order) is returned instead.
    ///
    /// # Errors
    ///
    /// Only in strict mode: the first per-string `ParseError`.
    pub fn parse_all<S>(
        &self,
        texts: &[S],
        strict: bool,
    ) -> Result<Vec<Result<Vec<TaxonDescriptor>, ParseError>>, ParseError>
    where
        S: AsRef<str> + Sync,
    {
        let results: Vec<_> = texts
            .par_iter()
            .map(|text| self.parse(text.as_ref()))
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

    fn parse_segment(&self, segment: &str) -> Option<TaxonDescriptor> {
        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }

        let (rank, name) = match &self.format.rank_separator {
            Some(sep) if self.format.reverse_rank_order => match segment.rsplit_once(sep.as_str()) {
                Some((name, rank)) => (Some(rank.trim()), name.trim()),
                None => (None, segment),
            },
            Some(sep) => match segment.split_once(sep.as_str()) {
                Some((rank, name)) => (Some(rank.trim()), name.trim()),
                None => (None, segment),
            },
            None => (None, segment),
        };

        if name.is_empty() && !self.format.keep_empty_names {
            return None;
        }

        let mut descriptor = TaxonDescriptor::new(name);
        if let Some(rank) = rank.filter(|r| !r.is_empty()) {
            descriptor.rank = Some(match &self.vocabulary {
                Some(vocabulary) => vocabulary.normalize(rank),
                None => rank.to_string(),
            });
        }
        Some(descriptor)
    }
}

/// Parse one classification string with ad-hoc delimiter settings
///
/// # Errors
///
/// Returns `ParseError::Record` if the separators are invalid, or the errors of
/// [`LineageParser::parse`].
pub fn parse(
    text: &str,
    taxon_separator: &str,
    rank_separator: Option<&str>,
    reverse_taxon_order: bool,
    reverse_rank_order: bool,
) -> Result<Vec<TaxonDescriptor>, ParseError> {
    let format = LineageFormat {
        taxon_separator: taxon_separator.to_string(),
        rank_separator: rank_separator.map(str::to_string),
        reverse_taxon_order,
        reverse_rank_order,
        ..LineageFormat::default()
    };
    let parser = LineageParser::new(format).map_err(|e| ParseError::Record {
        record: 0,
        message: e.to_string(),
    })?;
    parser.parse(text)
}
