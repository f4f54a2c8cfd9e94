//! Rank vocabulary used to normalize abbreviated rank tokens.
//!
//! Classification strings such as `k__Fungi;p__Ascomycota` (QIIME/Greengenes style)
//! carry single-letter rank codes. The embedded vocabulary maps these tokens to
//! full rank names. It is compiled into the binary and validated by `build.rs`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ConfigurationError;

/// Vocabulary version for compatibility checking
pub const VOCABULARY_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabularyData {
    version: String,
    ranks: Vec<RankEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RankEntry {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Lowercased token (rank name or alias) -> canonical rank name
#[derive(Debug, Clone, Default)]
pub struct RankVocabulary {
    tokens: HashMap<String, String>,
}

impl RankVocabulary {
    /// Load the embedded default vocabulary
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidSetting` if the embedded JSON is invalid.
    pub fn load_embedded() -> Result<Self, ConfigurationError> {
        // Embedded at compile time, validated by build.rs
        const EMBEDDED_VOCABULARY: &str = include_str!("../../data/rank_aliases.json");
        Self::from_json(EMBEDDED_VOCABULARY)
    }

    /// Parse a vocabulary from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidSetting` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let data: VocabularyData = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::InvalidSetting(format!("rank vocabulary: {e}")))?;

        // Version check (warn but don't fail)
        if data.version != VOCABULARY_VERSION {
            tracing::warn!(
                expected = VOCABULARY_VERSION,
                found = %data.version,
                "Rank vocabulary version mismatch"
            );
        }

        let mut tokens = HashMap::new();
        for entry in data.ranks {
            for alias in &entry.aliases {
                tokens.insert(alias.to_lowercase(), entry.name.clone());
            }
            tokens.insert(entry.name.to_lowercase(), entry.name);
        }

        Ok(Self { tokens })
    }

    /// Map a rank token to its canonical name; unknown tokens pass through unchanged
    #[must_use]
    pub fn normalize(&self, token: &str) -> String {
        self.tokens
            .get(&token.to_lowercase())
            .cloned()
            .unwrap_or_else(|| token.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
