//! Pipeline configuration.
//!
//! Settings can come from a JSON file and are then overridden by command-line
//! flags. Every field has a default, so a file only needs the values it changes:
//!
//! ```json
//! {
//!   "capture": {"kind": "fields", "separator": "\t", "roles": ["item_id", "lineage"]},
//!   "lineage": {"taxon_separator": ";", "rank_separator": "__"},
//!   "policy": "warn",
//!   "resolver": {"kind": "table", "table": "taxonomy.json"}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::types::ArbitraryIdPolicy;
use crate::error::ConfigurationError;
use crate::parsing::lineage::LineageFormat;
use crate::parsing::record::CaptureSpec;
use crate::resolver::ResolverSettings;
use crate::tree::registry::{RegistryOptions, DEFAULT_SYNTHETIC_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub capture: CaptureSpec,
    pub lineage: LineageFormat,
    pub policy: ArbitraryIdPolicy,
    pub resolver: ResolverSettings,
    /// Abort on the first record that fails to parse
    pub strict: bool,
    pub synthetic_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSpec::default(),
            lineage: LineageFormat::default(),
            policy: ArbitraryIdPolicy::default(),
            resolver: ResolverSettings::default(),
            strict: false,
            synthetic_prefix: DEFAULT_SYNTHETIC_PREFIX.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::Unreadable` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let unreadable = |message: String| ConfigurationError::Unreadable {
            path: path.display().to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))
    }

    /// Check every setting without touching any input
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigurationError` found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.capture.validate()?;
        self.lineage.validate()?;
        self.resolver.validate()?;

        let prefix = self.synthetic_prefix.trim();
        if prefix.is_empty() || prefix.len() != self.synthetic_prefix.len() {
            return Err(ConfigurationError::InvalidSetting(format!(
                "synthetic ID prefix '{}' must be non-empty without surrounding whitespace",
                self.synthetic_prefix
            )));
        }
        if prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigurationError::InvalidSetting(
                "synthetic ID prefix must not be numeric".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            policy: self.policy,
            synthetic_prefix: self.synthetic_prefix.clone(),
        }
    }
}
