//! Centralized validation and helper functions.

use crate::error::ConfigurationError;

/// Maximum number of records accepted in a single batch (DOS protection)
pub const MAX_RECORDS: usize = 5_000_000;

/// Check if adding another record would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new record.
/// Returns an error message if adding would exceed the limit, None if safe to add.
///
/// # Example
/// ```ignore
/// if check_record_limit(records.len()).is_some() {
///     return Err(...);
/// }
/// records.push(new_record); // Safe to add
/// ```
#[must_use]
pub fn check_record_limit(count: usize) -> Option<String> {
    if count >= MAX_RECORDS {
        Some(format!(
            "Too many records: adding another would exceed maximum of {MAX_RECORDS}"
        ))
    } else {
        None
    }
}

/// Validate a separator string.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidSeparator` if the separator is empty or
/// contains a line break (records are line-oriented).
///
/// # Examples
///
/// ```
/// use lineage_solver::utils::validation::validate_separator;
///
/// assert!(validate_separator("taxon separator", ";").is_ok());
/// assert!(validate_separator("taxon separator", "").is_err());
/// ```
pub fn validate_separator(label: &str, separator: &str) -> Result<(), ConfigurationError> {
    if separator.is_empty() {
        return Err(ConfigurationError::InvalidSeparator(format!(
            "{label} must not be empty"
        )));
    }
    if separator.contains('\n') || separator.contains('\r') {
        return Err(ConfigurationError::InvalidSeparator(format!(
            "{label} must not contain line breaks"
        )));
    }
    Ok(())
}

/// Compute a signature hash from a collection of lines.
///
/// The signature is computed by:
/// 1. Sorting the lines alphabetically (duplicates are kept)
/// 2. Joining them with newlines
/// 3. Computing MD5 of the concatenated string
///
/// This provides an identifier that does not depend on insertion order.
#[must_use]
pub fn compute_signature<I>(lines: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut sorted: Vec<String> = lines.into_iter().collect();
    if sorted.is_empty() {
        return String::new();
    }

    sorted.sort_unstable();
    let concatenated = sorted.join("\n");
    let digest = md5::compute(concatenated.as_bytes());
    format!("{digest:x}")
}
