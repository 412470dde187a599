//! rulemesh - relationship analysis for WAF rule sets.
//!
//! Rules are replayed against a corpus of recorded transactions and every pair of
//! rules is classified as shadowing (SHD), redundancy (RXD), correlation (COR) or
//! subsumption (SUB) from the overlap of their match sets.
//!
//! # Example
//!
//! ```no_run
//! use rulemesh::{analyze, RuleRecord, TransactionRecord};
//!
//! let rules = vec![
//!     RuleRecord::new("1", "select", "block").with_phase(1).with_priority(1),
//!     RuleRecord::new("2", "select", "block").with_phase(1).with_priority(2),
//! ];
//! let traffic = vec![TransactionRecord::new("/items?q=select")];
//!
//! let report = analyze(&rules, &traffic, &["SHD", "RXD"]).unwrap();
//! for rel in report.relationships() {
//!     println!("{}", rel.description);
//! }
//! ```

pub mod aggregate;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod detectors;
pub mod enrich;
pub mod error;
pub mod matrix;
pub mod output;
pub mod ruleset;
pub mod types;

// Re-export commonly used types at crate root
pub use analyzer::{CancellationToken, RelationshipAnalyzer};
pub use config::AnalysisConfig;
pub use corpus::{TrafficCorpus, TransactionRecord};
pub use enrich::{NoopEnricher, RelationshipEnricher};
pub use error::{Result, RulemeshError};
pub use matrix::{MatchMatrix, MatchSet};
pub use ruleset::{CompileStatus, RuleRecord, RuleSet};
pub use types::{AnalysisReport, Participants, Recommendation, Relationship, RelationshipType};

use detectors::DetectionContext;
use tracing::info;

/// Normalized inputs and their match matrix for one run
#[derive(Debug)]
pub struct Prepared {
    pub rules: RuleSet,
    pub corpus: TrafficCorpus,
    pub matrix: MatchMatrix,
}

/// Validate, normalize and evaluate every rule against every transaction.
///
/// Traffic is checked first, so a malformed corpus is reported before any pattern
/// is compiled.
pub fn prepare(
    rules: &[RuleRecord],
    traffic: &[TransactionRecord],
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<Prepared> {
    config.validate()?;
    let corpus = TrafficCorpus::from_records(traffic)?;
    let rules = RuleSet::from_records(rules, config)?;
    let matrix = MatchMatrix::build(&rules, &corpus, cancel)?;
    Ok(Prepared { rules, corpus, matrix })
}

/// Analyze with default settings and no enrichment.
///
/// `types` are relationship codes (`"SHD"`, `"RXD"`, `"COR"`, `"SUB"`), matched
/// case-insensitively; unknown codes are ignored.
pub fn analyze<S: AsRef<str>>(
    rules: &[RuleRecord],
    traffic: &[TransactionRecord],
    types: &[S],
) -> Result<AnalysisReport> {
    analyze_with(
        rules,
        traffic,
        types,
        &AnalysisConfig::default(),
        &NoopEnricher,
        &CancellationToken::new(),
    )
}

/// Full pipeline: normalize, build the matrix, detect, aggregate, enrich.
pub fn analyze_with<S: AsRef<str>>(
    rules: &[RuleRecord],
    traffic: &[TransactionRecord],
    types: &[S],
    config: &AnalysisConfig,
    enricher: &dyn RelationshipEnricher,
    cancel: &CancellationToken,
) -> Result<AnalysisReport> {
    let types = RelationshipType::parse_list(types);
    let prepared = prepare(rules, traffic, config, cancel)?;

    let ctx = DetectionContext::new(&prepared.rules, &prepared.corpus, &prepared.matrix, config);
    let relationships = RelationshipAnalyzer::new(ctx).analyze(&types, cancel)?;

    let mut report = aggregate::compile_results(&prepared.rules, &prepared.matrix, relationships);
    enrich::apply_enrichment(enricher, &prepared.rules, &mut report);

    info!(
        "Analysis complete: {} rules, {} relationships",
        report.total_rules, report.total_relationships
    );
    Ok(report)
}
