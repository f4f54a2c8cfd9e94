//! Command-line interface for lineage-solver.
//!
//! Available commands:
//!
//! - **build**: Parse records, merge their lineages and print taxon and item tables
//! - **query**: Ask ancestor and descendant questions of a saved tree
//!
//! ## Usage
//!
//! ```text
//! # Build a tree from a TSV of item IDs and classification strings
//! lineage-solver build records.tsv --roles item_id,lineage --output tree.json
//!
//! # Greengenes-style lineages with rank prefixes
//! lineage-solver build otus.tsv --roles item_id,lineage --rank-sep __ --normalize-ranks
//!
//! # FASTA headers such as ">AB1234 Fungi;Ascomycota"
//! lineage-solver build seqs.fa --pattern '^(\S+) (.+)$' --roles item_id,lineage
//!
//! # All descendants of two taxa, as one list
//! lineage-solver query tree.json subtaxa tx1 tx4 --recursive --simplify
//! ```

use clap::{Parser, Subcommand};

pub mod build;
pub mod query;

#[derive(Parser)]
#[command(name = "lineage-solver")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Merge taxonomic lineages from free-text records into one taxon tree")]
#[command(
    long_about = "lineage-solver extracts classification strings, taxon names or identifiers from input records, merges them into a single deduplicated taxon tree and binds every record to its leaf taxon.\n\nTaxa without a canonical identifier are handled according to the arbitrary-ID policy:\n- allow: synthesize an identifier\n- warn: synthesize and log a warning\n- error: abort\n- na: leave the identifier empty"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a taxon tree from input records
    Build(build::BuildArgs),

    /// Query a saved taxon tree
    Query(query::QueryArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
