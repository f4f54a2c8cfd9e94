//! Input adapters feeding the record parser.
//!
//! Every supported input shape reduces to [`LabeledText`]: the text that carries a
//! record's classification, plus metadata the shape itself provides.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::ParseError;
use crate::parsing::fasta::{is_fasta_file, is_gzipped, parse_fasta_file};
use crate::utils::validation::check_record_limit;

/// Text of one record plus metadata contributed by its input shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledText {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl LabeledText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Header and length of one sequence from a sequence collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Name and description, separated by a space
    pub header: String,
    pub length: u64,
}

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    /// One record per line
    Text,
    /// Sequence collection; headers are the records
    Fasta,
}

impl InputFormat {
    /// Detect format from file extension, defaulting to text
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        if is_fasta_file(path) {
            Self::Fasta
        } else {
            Self::Text
        }
    }
}

/// Records to classify, in one of the supported shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Text(Vec<String>),
    Sequences(Vec<SequenceRecord>),
}

impl InputSource {
    /// Read records from a file, auto-detecting the format unless given
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the file cannot be read, or the errors of the
    /// format-specific reader.
    pub fn from_path(path: &Path, format: Option<InputFormat>) -> Result<Self, ParseError> {
        match format.unwrap_or_else(|| InputFormat::from_path(path)) {
            InputFormat::Text => Self::read_text_file(path),
            InputFormat::Fasta => Ok(Self::Sequences(parse_fasta_file(path)?)),
        }
    }

    /// Read a line-oriented text file (optionally gzipped)
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the file cannot be read, or
    /// `ParseError::TooManyRecords` if the limit is exceeded.
    pub fn read_text_file(path: &Path) -> Result<Self, ParseError> {
        let file = std::fs::File::open(path)?;
        if is_gzipped(path) {
            Self::read_text(GzDecoder::new(file))
        } else {
            Self::read_text(file)
        }
    }

    /// Read line-oriented records, skipping blank lines and `#` comments
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` on read failure, or `ParseError::TooManyRecords`.
    pub fn read_text<R: Read>(reader: R) -> Result<Self, ParseError> {
        let mut lines = Vec::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            if check_record_limit(lines.len()).is_some() {
                return Err(ParseError::TooManyRecords(lines.len()));
            }
            lines.push(line);
        }
        Ok(Self::Text(lines))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(lines) => lines.len(),
            Self::Sequences(records) => records.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The records as labeled text; sequence lengths become item metadata `length`
    #[must_use]
    pub fn labeled_text(&self) -> Vec<LabeledText> {
        match self {
            Self::Text(lines) => lines.iter().map(LabeledText::new).collect(),
            Self::Sequences(records) => records
                .iter()
                .map(|record| {
                    let mut labeled = LabeledText::new(record.header.clone());
                    labeled
                        .metadata
                        .insert("length".to_string(), record.length.to_string());
                    labeled
                })
                .collect(),
        }
    }
}
