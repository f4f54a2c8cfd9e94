use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::config::PipelineConfig;
use crate::core::types::ArbitraryIdPolicy;
use crate::parsing::input::{InputFormat, InputSource};
use crate::parsing::record::{parse_roles, CaptureSpec};
use crate::pipeline::classify::{Classification, Classifier};
use crate::resolver::ResolverKind;

#[derive(Args)]
pub struct BuildArgs {
    /// Input file: one record per line, or FASTA (optionally gzipped)
    #[arg(required = true)]
    pub input: PathBuf,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Input format (auto-detected from the extension by default)
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    // === Capture options ===
    /// Regular expression with one capture group per role
    #[arg(long, conflicts_with = "field_sep")]
    pub pattern: Option<String>,

    /// Field separator for delimited records (`\t` for tab)
    #[arg(long)]
    pub field_sep: Option<String>,

    /// Comma-separated roles, e.g. item_id,lineage,taxon_info:habitat
    #[arg(long)]
    pub roles: Option<String>,

    // === Lineage options ===
    /// Separator between taxa in a classification string
    #[arg(long)]
    pub taxon_sep: Option<String>,

    /// Separator between rank and name within one taxon
    #[arg(long)]
    pub rank_sep: Option<String>,

    /// Classification strings list the most specific taxon first
    #[arg(long)]
    pub reverse_taxa: bool,

    /// Taxa are written name<sep>rank instead of rank<sep>name
    #[arg(long)]
    pub reverse_ranks: bool,

    /// Expand rank abbreviations such as k, p, c
    #[arg(long)]
    pub normalize_ranks: bool,

    /// Keep taxa with empty names instead of dropping them
    #[arg(long)]
    pub keep_empty_names: bool,

    // === Resolution options ===
    /// What to do with taxa lacking a canonical identifier
    #[arg(long, value_enum)]
    pub policy: Option<ArbitraryIdPolicy>,

    /// Identifier resolver: none or table
    #[arg(long)]
    pub resolver: Option<String>,

    /// Taxonomy table for the table resolver (implies --resolver table)
    #[arg(long)]
    pub resolver_table: Option<PathBuf>,

    /// Per-call resolver timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Prefix of synthesized taxon identifiers
    #[arg(long)]
    pub id_prefix: Option<String>,

    /// Abort on the first record that cannot be parsed
    #[arg(long)]
    pub strict: bool,

    /// Save the tree and items as a JSON snapshot
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: BuildArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let classifier = Classifier::from_config(config)?;

    let source = InputSource::from_path(&args.input, args.input_format)?;
    if verbose {
        eprintln!(
            "Read {} records from {}",
            source.len(),
            args.input.display()
        );
    }

    let classification = classifier.classify(&source.labeled_text())?;

    if let Some(output) = &args.output {
        classification.snapshot().save(output)?;
        if verbose {
            eprintln!("Saved snapshot to {}", output.display());
        }
    }

    match format {
        OutputFormat::Text => print_text(&classification),
        OutputFormat::Json => print_json(&classification)?,
        OutputFormat::Tsv => print_tsv(&classification, &classifier.config().capture),
    }

    Ok(())
}

/// Configuration file (or defaults) overridden by command-line flags
fn resolve_config(args: &BuildArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    config.capture = capture_spec(args, config.capture)?;

    if let Some(sep) = &args.taxon_sep {
        config.lineage.taxon_separator = unescape(sep);
    }
    if let Some(sep) = &args.rank_sep {
        config.lineage.rank_separator = Some(unescape(sep));
    }
    config.lineage.reverse_taxon_order |= args.reverse_taxa;
    config.lineage.reverse_rank_order |= args.reverse_ranks;
    config.lineage.normalize_ranks |= args.normalize_ranks;
    config.lineage.keep_empty_names |= args.keep_empty_names;

    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(resolver) = &args.resolver {
        config.resolver.kind = resolver.parse()?;
    }
    if let Some(table) = &args.resolver_table {
        config.resolver.kind = ResolverKind::Table;
        config.resolver.table = Some(table.clone());
    }
    if args.timeout.is_some() {
        config.resolver.timeout_secs = args.timeout;
    }
    if let Some(prefix) = &args.id_prefix {
        config.synthetic_prefix.clone_from(prefix);
    }
    config.strict |= args.strict;

    config.validate()?;
    Ok(config)
}

fn capture_spec(args: &BuildArgs, base: CaptureSpec) -> anyhow::Result<CaptureSpec> {
    let roles = args.roles.as_deref().map(parse_roles).transpose()?;

    Ok(match (&args.pattern, &args.field_sep) {
        (Some(pattern), _) => CaptureSpec::Regex {
            pattern: pattern.clone(),
            roles: roles.unwrap_or_else(|| base.roles().to_vec()),
        },
        (None, Some(separator)) => CaptureSpec::Fields {
            separator: unescape(separator),
            roles: roles.unwrap_or_else(|| base.roles().to_vec()),
        },
        (None, None) => match (base, roles) {
            (CaptureSpec::Regex { pattern, .. }, Some(roles)) => CaptureSpec::Regex { pattern, roles },
            (CaptureSpec::Fields { separator, .. }, Some(roles)) => {
                CaptureSpec::Fields { separator, roles }
            }
            (base, None) => base,
        },
    })
}

/// Shell-friendly escapes for separators
fn unescape(separator: &str) -> String {
    separator.replace("\\t", "\t").replace("\\n", "\n")
}

fn print_text(classification: &Classification) {
    let tree = &classification.tree;
    let report = &classification.report;

    println!(
        "Taxa: {}  Items: {}  Bound: {}  Unbound: {}",
        tree.len(),
        classification.tables.items.len(),
        report.bound,
        report.unbound
    );
    println!();

    let mut stack: Vec<(usize, usize)> = tree.roots().iter().rev().map(|&i| (i, 0)).collect();
    while let Some((index, depth)) = stack.pop() {
        if let Some(taxon) = tree.get(index) {
            let rank = taxon
                .rank
                .as_deref()
                .map(|r| format!(" [{r}]"))
                .unwrap_or_default();
            println!("{}{}{rank}", "  ".repeat(depth), taxon.label());
        }
        stack.extend(
            tree.children_of(Some(index))
                .iter()
                .rev()
                .map(|&child| (child, depth + 1)),
        );
    }

    if !report.fallbacks.is_empty() {
        println!();
        println!("Fallbacks:");
        for fallback in &report.fallbacks {
            println!("  record {}: {}", fallback.record + 1, fallback.message);
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &report.failures {
            println!(
                "  record {} ({}): {}",
                failure.record + 1,
                failure.stage,
                failure.message
            );
        }
    }
}

fn print_json(classification: &Classification) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "taxa": classification.taxon_rows(),
        "items": classification.item_rows(),
        "report": classification.report,
        "topology_signature": classification.tree.topology_signature(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv(classification: &Classification, capture: &CaptureSpec) {
    let columns = capture.taxon_columns();

    let mut header = vec!["index", "taxon_id", "parent_index", "parent_id", "name", "rank", "origin"];
    header.extend(columns.iter().map(String::as_str));
    println!("{}", header.join("\t"));

    for row in classification.taxon_rows() {
        let mut fields = vec![
            row.index.to_string(),
            row.taxon_id.map(|id| id.0).unwrap_or_default(),
            row.parent_index.map(|i| i.to_string()).unwrap_or_default(),
            row.parent_id.map(|id| id.0).unwrap_or_default(),
            row.name,
            row.rank.unwrap_or_default(),
            row.origin.to_string(),
        ];
        fields.extend(
            columns
                .iter()
                .map(|column| row.metadata.get(column).cloned().unwrap_or_default()),
        );
        println!("{}", fields.join("\t"));
    }

    println!();
    println!("item_id\ttaxon_index\ttaxon_id");
    for row in classification.item_rows() {
        println!(
            "{}\t{}\t{}",
            row.item_id,
            row.taxon_index.map(|i| i.to_string()).unwrap_or_default(),
            row.taxon_id.map(|id| id.0).unwrap_or_default()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::record::Role;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: BuildArgs,
    }

    fn args(argv: &[&str]) -> BuildArgs {
        let mut full = vec!["lineage-solver"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = args(&[
            "in.tsv",
            "--roles",
            "item_id,lineage",
            "--rank-sep",
            "__",
            "--policy",
            "na",
            "--field-sep",
            "\\t",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.policy, ArbitraryIdPolicy::Na);
        assert_eq!(config.lineage.rank_separator.as_deref(), Some("__"));
        assert_eq!(
            config.capture,
            CaptureSpec::Fields {
                separator: "\t".to_string(),
                roles: vec![Role::ItemId, Role::Lineage],
            }
        );
    }

    #[test]
    fn test_pattern_requires_matching_roles() {
        let args = args(&["in.fa", "--pattern", "^(\\S+) (.+)$", "--roles", "lineage"]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_network_resolver_is_rejected() {
        let args = args(&["in.tsv", "--resolver", "gbif"]);
        let err = resolve_config(&args).unwrap_err();
        assert!(err.to_string().contains("network"));
    }
}
