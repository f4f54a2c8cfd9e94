//! Parser for FASTA files using noodles.
//!
//! Extracts header text (name and description) and sequence lengths. Sequences
//! themselves are not kept.
//! Supports both uncompressed and gzip/bgzip compressed files.
//!
//! Supported extensions:
//! - `.fa`, `.fasta`, `.fna`, `.faa`, `.fas` (uncompressed)
//! - the same with `.gz` or `.bgz` appended (compressed)

use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use noodles::fasta;

use crate::error::ParseError;
use crate::parsing::input::SequenceRecord;
use crate::utils::validation::check_record_limit;

const FASTA_EXTENSIONS: [&str; 5] = ["fa", "fasta", "fna", "faa", "fas"];

/// Check if the path has a FASTA extension
pub fn is_fasta_file(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();

    // Check for compressed FASTA
    for ext in FASTA_EXTENSIONS {
        if path_str.ends_with(&format!(".{ext}.gz")) || path_str.ends_with(&format!(".{ext}.bgz"))
        {
            return true;
        }
    }

    // Check for uncompressed FASTA
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_lowercase)
        .is_some_and(|ext| FASTA_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
pub(crate) fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Parse a FASTA file into header records.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles` if
/// parsing fails, `ParseError::Empty` if no records are found, or
/// `ParseError::TooManyRecords` if the limit is exceeded.
pub fn parse_fasta_file(path: &Path) -> Result<Vec<SequenceRecord>, ParseError> {
    let file = std::fs::File::open(path)?;
    if is_gzipped(path) {
        let reader = BufReader::new(GzDecoder::new(file));
        parse_fasta_reader(&mut fasta::io::Reader::new(reader))
    } else {
        let reader = BufReader::new(file);
        parse_fasta_reader(&mut fasta::io::Reader::new(reader))
    }
}

/// Parse FASTA records from any buffered reader
///
/// # Errors
///
/// See [`parse_fasta_file`].
pub fn parse_fasta_reader<R: BufRead>(
    reader: &mut fasta::io::Reader<R>,
) -> Result<Vec<SequenceRecord>, ParseError> {
    let mut records = Vec::new();

    for result in reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;

        // Check record limit for DOS protection
        if check_record_limit(records.len()).is_some() {
            return Err(ParseError::TooManyRecords(records.len()));
        }

        let name = String::from_utf8_lossy(record.name()).to_string();
        let header = match record.description() {
            Some(description) => format!("{name} {}", String::from_utf8_lossy(description)),
            None => name,
        };
        let length = record.sequence().len() as u64;

        records.push(SequenceRecord { header, length });
    }

    if records.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(records)
}
