use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};

use crate::cli::OutputFormat;
use crate::core::types::{ReturnMode, TaxonKey};
use crate::tree::store::{TaxonTree, TreeSnapshot};
use crate::tree::traversal::{
    QueryOutcome, Recursion, SubtaxaOptions, SubtaxaResult, SupertaxaOptions, TaxonQuery,
    TraversalEngine,
};

#[derive(Args)]
pub struct QueryArgs {
    /// Snapshot written by `build --output`
    #[arg(required = true)]
    pub snapshot: PathBuf,

    #[command(subcommand)]
    pub command: QueryCommands,

    /// Walk all levels instead of one
    #[arg(short, long, global = true)]
    pub recursive: bool,

    /// Walk at most this many levels
    #[arg(long, global = true, conflicts_with = "recursive")]
    pub depth: Option<usize>,

    /// Merge subtaxa of all keys into one deduplicated list
    #[arg(long, global = true)]
    pub simplify: bool,

    /// Include each queried taxon in its own result
    #[arg(long, global = true)]
    pub include_input: bool,

    /// Report taxon table slots (`#n`) instead of identifiers
    #[arg(long, global = true)]
    pub index: bool,
}

#[derive(Subcommand)]
pub enum QueryCommands {
    /// Taxa without a parent
    Roots,

    /// Ancestors of the given taxa, nearest first
    Supertaxa {
        /// Taxon identifiers, or `#n` for a table slot
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Descendants of the given taxa, breadth first
    Subtaxa {
        /// Taxon identifiers, or `#n` for a table slot
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Leaf taxa, of the whole tree or below the given taxa
    Leaves {
        /// Taxon identifiers, or `#n` for a table slot
        keys: Vec<String>,
    },

    /// Root-first name path of the given taxa
    Classification {
        /// Taxon identifiers, or `#n` for a table slot
        #[arg(required = true)]
        keys: Vec<String>,

        /// Separator between names
        #[arg(long, default_value = ";")]
        separator: String,
    },
}

pub fn run(args: QueryArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let (tree, items) = TreeSnapshot::load(&args.snapshot)
        .and_then(TreeSnapshot::into_parts)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;

    if verbose {
        eprintln!(
            "Loaded {} taxa and {} items from {}",
            tree.len(),
            items.len(),
            args.snapshot.display()
        );
    }

    let engine = TraversalEngine::new(&tree);
    let mode = if args.index {
        ReturnMode::Index
    } else {
        ReturnMode::Id
    };
    let recursion = match args.depth {
        Some(depth) => Recursion::Depth(depth),
        None => Recursion::from(args.recursive),
    };

    match &args.command {
        QueryCommands::Roots => print_keys(&tree, &engine.roots(mode), format)?,
        QueryCommands::Supertaxa { keys } => {
            let results = engine.supertaxa(
                &parse_keys(keys)?,
                &SupertaxaOptions {
                    recursion,
                    include_input: args.include_input,
                    return_mode: mode,
                },
            );
            print_queries(&tree, &results, format)?;
        }
        QueryCommands::Subtaxa { keys } => {
            let result = engine.subtaxa(
                &parse_keys(keys)?,
                &SubtaxaOptions {
                    recursion,
                    simplify: args.simplify,
                    include_input: args.include_input,
                    return_mode: mode,
                },
            );
            match result {
                SubtaxaResult::PerKey(results) => print_queries(&tree, &results, format)?,
                SubtaxaResult::Simplified { taxa, missing } => {
                    for key in &missing {
                        eprintln!("Warning: {key} is not in the tree");
                    }
                    print_keys(&tree, &taxa, format)?;
                }
            }
        }
        QueryCommands::Leaves { keys } if keys.is_empty() => {
            print_keys(&tree, &engine.all_leaves(mode), format)?;
        }
        QueryCommands::Leaves { keys } => {
            let results = engine.leaves(&parse_keys(keys)?, mode);
            print_queries(&tree, &results, format)?;
        }
        QueryCommands::Classification { keys, separator } => {
            for key in parse_keys(keys)? {
                match engine.classification(&key, separator) {
                    Some(path) => println!("{key}\t{path}"),
                    None => eprintln!("Warning: {key} is not in the tree"),
                }
            }
        }
    }

    Ok(())
}

fn parse_keys(keys: &[String]) -> anyhow::Result<Vec<TaxonKey>> {
    keys.iter()
        .map(|key| {
            key.parse::<TaxonKey>()
                .with_context(|| format!("Invalid taxon key '{key}'"))
        })
        .collect()
}

fn name_of<'a>(tree: &'a TaxonTree, key: &TaxonKey) -> &'a str {
    tree.resolve(key)
        .and_then(|index| tree.get(index))
        .map_or("", |taxon| taxon.name.as_str())
}

fn print_keys(tree: &TaxonTree, keys: &[TaxonKey], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(keys)?),
        OutputFormat::Text | OutputFormat::Tsv => {
            for key in keys {
                println!("{key}\t{}", name_of(tree, key));
            }
        }
    }
    Ok(())
}

fn print_queries(tree: &TaxonTree, results: &[TaxonQuery], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::Text => {
            for query in results {
                match &query.outcome {
                    QueryOutcome::Found(keys) => {
                        let names: Vec<String> = keys
                            .iter()
                            .map(|key| format!("{} ({key})", name_of(tree, key)))
                            .collect();
                        println!("{}: {}", query.key, names.join(", "));
                    }
                    QueryOutcome::Missing => println!("{}: not in the tree", query.key),
                }
            }
        }
        OutputFormat::Tsv => {
            println!("query\ttaxon\tname");
            for query in results {
                if let QueryOutcome::Found(keys) = &query.outcome {
                    for key in keys {
                        println!("{}\t{key}\t{}", query.key, name_of(tree, key));
                    }
                }
            }
        }
    }
    Ok(())
}
