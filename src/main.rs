use anyhow::{Context, Result};
use clap::Parser;
use rulemesh::cli::{self, Command, OutputFormat};
use rulemesh::{output, CancellationToken, NoopEnricher, RuleRecord, TransactionRecord};
use serde::de::DeserializeOwned;
use std::fs;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Read a JSON array of records from `path`
fn load_records<T: DeserializeOwned>(path: &str, what: &str) -> Result<Vec<T>> {
    let text = fs::read_to_string(path).context(format!("Failed to read {} from {}", what, path))?;
    let records: Vec<T> =
        serde_json::from_str(&text).context(format!("Failed to parse {} in {}", what, path))?;
    debug!("Loaded {} {} from {}", records.len(), what, path);
    Ok(records)
}

fn load_inputs(rules: &str, traffic: &str) -> Result<(Vec<RuleRecord>, Vec<TransactionRecord>)> {
    let rules: Vec<RuleRecord> = load_records(rules, "rules")?;
    let traffic: Vec<TransactionRecord> = load_records(traffic, "traffic")?;
    eprintln!("Loaded {} rules and {} transactions", rules.len(), traffic.len());
    Ok((rules, traffic))
}

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // RUST_LOG wins, otherwise the verbose flag picks the level
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("rulemesh=debug")
    } else {
        EnvFilter::new("rulemesh=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("Logging initialized (verbose={})", args.verbose);

    rayon::ThreadPoolBuilder::new()
        .build_global()
        .ok(); // already initialized in tests

    // Status info never goes to stdout
    eprintln!("rulemesh v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("WAF rule relationship analysis\n");

    let config = args.command.analysis_config();
    let cancel = CancellationToken::new();

    let result = match &args.command {
        Command::Analyze { rules, traffic, types, .. } => {
            let (rules, traffic) = load_inputs(rules, traffic)?;
            let report = rulemesh::analyze_with(&rules, &traffic, types.as_slice(), &config, &NoopEnricher, &cancel)
                .context("Analysis failed")?;
            match args.format {
                OutputFormat::Json => output::format_json(&report)?,
                OutputFormat::Terminal => output::format_terminal(&report)?,
            }
        }
        Command::Matrix { rules, traffic } => {
            let (rules, traffic) = load_inputs(rules, traffic)?;
            let prepared = rulemesh::prepare(&rules, &traffic, &config, &cancel)
                .context("Failed to build match matrix")?;
            let rows = output::rule_hit_rows(&prepared.rules, &prepared.matrix);
            match args.format {
                OutputFormat::Json => output::format_hits_json(&rows)?,
                OutputFormat::Terminal => output::format_hits_terminal(&rows, prepared.corpus.len())?,
            }
        }
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &result).context(format!("Failed to write output to {}", output_path))?;
        eprintln!("Results written to: {}", output_path);
    } else {
        print!("{}", result);
    }

    Ok(())
}
