use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};

use kmer_classify::kmer_table::read_sample_summary;
use kmer_classify::report::{render_summary, render_table};
use kmer_classify::{classify_sample, ClassifyConfig, DatabaseSource, ResultCollection};

#[derive(Parser)]
#[command(name = "kmer-classify")]
#[command(version)]
#[command(about = "Classify a sample's k-mer table against a k-mer database of reference organisms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a sorted sample k-mer table
    Classify(ClassifyArgs),
    /// Print a previously saved result file
    Report(ReportArgs),
}

#[derive(Args)]
struct ClassifyArgs {
    /// Sample k-mer table (sequence<TAB>count, sorted by sequence; may be .gz)
    #[arg(short, long)]
    sample: PathBuf,

    /// Name of a built-in database library
    #[arg(long, conflicts_with = "database", required_unless_present = "database")]
    library: Option<String>,

    /// Path to a custom database manifest (k-mer size read from a `_<k>` suffix unless --k is given)
    #[arg(long)]
    database: Option<PathBuf>,

    /// k-mer size
    #[arg(short, long)]
    k: Option<usize>,

    /// Shard key length
    #[arg(long, default_value_t = kmer_classify::config::DEFAULT_PREFIX_LEN)]
    prefix_len: usize,

    /// Minimum complexity (entropy) a sample k-mer needs to be kept
    #[arg(long, default_value_t = kmer_classify::config::DEFAULT_ENTROPY_THRESHOLD)]
    entropy: f64,

    /// Parent directory for scratch files
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Directory holding the built-in databases
    #[arg(long)]
    db_dir: Option<PathBuf>,

    /// Summary file from the k-mer counting tool
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Save results to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write matched k-mers to this file
    #[arg(long)]
    matches: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    /// Saved result file
    results: PathBuf,

    /// Good distinct k-mers of the sample (denominator of %kmers)
    #[arg(long)]
    good_distinct: u64,

    /// Good k-mer total of the sample (denominator of %total)
    #[arg(long)]
    good_total: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Classify(args) => run_classify(args, cli.format),
        Commands::Report(args) => run_report(args, cli.format),
    }
}

fn run_classify(args: ClassifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let database = match (&args.library, &args.database, args.k) {
        (Some(library), None, Some(k)) => DatabaseSource::built_in(library.clone(), k),
        (Some(_), None, None) => bail!("--k is required with --library"),
        (None, Some(path), Some(k)) => DatabaseSource::custom_with_k(path.clone(), k),
        (None, Some(path), None) => DatabaseSource::custom(path.clone())?,
        _ => bail!("exactly one of --library or --database is required"),
    };

    let mut config = ClassifyConfig::with_k(database.k_size());
    config.prefix_len = args.prefix_len;
    config.entropy_threshold = args.entropy;
    if let Some(dir) = args.work_dir {
        config.work_dir = dir;
    }
    if let Some(dir) = args.db_dir {
        config.builtin_db_dir = dir;
    }

    let sample_summary = args
        .summary
        .as_ref()
        .map(read_sample_summary)
        .transpose()
        .context("reading sample summary")?;

    let run = classify_sample(&config, &args.sample, &database)
        .with_context(|| format!("classifying {}", args.sample.display()))?;

    if let Some(path) = &args.output {
        run.results.save_to_file(path)?;
    }
    if let Some(path) = &args.matches {
        run.matches.write_tsv(path, &run.organisms)?;
    }

    match format {
        OutputFormat::Text => {
            print!("{}", render_summary(&run.counters, &run.results, sample_summary.as_ref()));
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "config": config,
                "sample": sample_summary,
                "counters": run.counters,
                "results": run.results,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn run_report(args: ReportArgs, format: OutputFormat) -> anyhow::Result<()> {
    let results = ResultCollection::load_from_file(&args.results, args.good_distinct, args.good_total)
        .with_context(|| format!("loading {}", args.results.display()))?;

    match format {
        OutputFormat::Text => print!("{}", render_table(&results)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }
    Ok(())
}
