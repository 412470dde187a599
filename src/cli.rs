use crate::config::{
    AnalysisConfig, DEFAULT_CONTAINMENT_THRESHOLD, DEFAULT_FUZZ_SEED, DEFAULT_SAMPLE_FUZZ_TRIALS,
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rulemesh")]
#[command(about = "Find shadowed, redundant, correlated and subsumed WAF rules from replayed traffic")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format (json, terminal)
    #[arg(short, long, global = true, default_value = "terminal")]
    pub format: OutputFormat,

    /// Write output to file
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect pairwise rule relationships
    Analyze {
        /// JSON array of rule records
        rules: String,

        /// JSON array of transaction records
        traffic: String,

        /// Relationship types to detect (unknown codes are ignored)
        #[arg(short, long, value_delimiter = ',', default_value = "SHD,RXD,COR,SUB")]
        types: Vec<String>,

        /// Sampled texts tested per subsumption direction
        #[arg(long, default_value_t = DEFAULT_SAMPLE_FUZZ_TRIALS)]
        fuzz_trials: usize,

        /// Minimum combined containment to report subsumption
        #[arg(long, default_value_t = DEFAULT_CONTAINMENT_THRESHOLD)]
        containment_threshold: f64,

        /// Seed for the random fuzzing branch
        #[arg(long, default_value_t = DEFAULT_FUZZ_SEED)]
        seed: u64,
    },

    /// Show per-rule hit counts and compile status
    Matrix {
        /// JSON array of rule records
        rules: String,

        /// JSON array of transaction records
        traffic: String,
    },
}

impl Command {
    /// Analysis settings from the command line (defaults for `matrix`)
    pub fn analysis_config(&self) -> AnalysisConfig {
        match self {
            Command::Analyze {
                fuzz_trials,
                containment_threshold,
                seed,
                ..
            } => AnalysisConfig::new()
                .with_sample_fuzz_trials(*fuzz_trials)
                .with_containment_threshold(*containment_threshold)
                .with_fuzz_seed(*seed),
            Command::Matrix { .. } => AnalysisConfig::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output for machine consumption
    Json,
    /// Human-readable terminal output
    Terminal,
}
