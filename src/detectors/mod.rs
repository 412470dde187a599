//! Pairwise relationship detectors.
//!
//! Each detector scores one ordered rule pair (`a` runs no later than `b`) and
//! returns `Ok(None)` when the relationship does not hold. A recoverable `Err`
//! only affects that pair and that relationship type.
//!
//! # Structure
//! - `shadowing`: SHD, execution-order aware
//! - `redundancy`: RXD, overlap ratio + jaccard
//! - `correlation`: COR, lift over independence
//! - `subsumption`: SUB, traffic containment combined with fuzzing
//! - `fuzzer`: the sampling containment oracle used by SUB
//!
//! SHD decides which rows the orchestrator visits and is always run first. The
//! other three implement `PairDetector` and can be swapped or extended.

mod correlation;
mod fuzzer;
mod redundancy;
mod shadowing;
mod subsumption;

pub use correlation::{
    correlation_confidence, correlation_metrics, detect_correlation, CorrelationDetector, CorrelationMetrics,
};
pub use fuzzer::{random_probe, seeded_rng, ContainmentFuzzer};
pub use redundancy::{detect_redundancy, redundancy_metrics, RedundancyDetector, RedundancyMetrics};
pub use shadowing::{detect_shadowing, BlockingIndex};
pub use subsumption::{detect_subsumption, traffic_containment, SubsumptionDetector};

use crate::config::{AnalysisConfig, MAX_EVIDENCE_IDS};
use crate::corpus::TrafficCorpus;
use crate::error::{Result, RulemeshError};
use crate::matrix::{MatchMatrix, MatchSet};
use crate::ruleset::RuleSet;
use crate::types::{Relationship, RelationshipType};

/// Scores one pair for one relationship type.
///
/// Called concurrently from several workers. An `Err` that `is_recoverable` drops
/// only this (pair, type); any other error aborts the run.
pub trait PairDetector: Send + Sync {
    fn kind(&self) -> RelationshipType;

    fn detect(&self, ctx: &DetectionContext<'_>, a: usize, b: usize) -> Result<Vec<Relationship>>;
}

/// RXD, COR and SUB with the fuzzing settings from `config`
pub fn default_detectors(config: &AnalysisConfig) -> Vec<Box<dyn PairDetector>> {
    vec![
        Box::new(RedundancyDetector),
        Box::new(CorrelationDetector),
        Box::new(SubsumptionDetector::new(ContainmentFuzzer::from_config(config))),
    ]
}

/// Read-only view of one run shared by all detectors
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub rules: &'a RuleSet,
    pub corpus: &'a TrafficCorpus,
    pub matrix: &'a MatchMatrix,
    pub config: &'a AnalysisConfig,
}

impl<'a> DetectionContext<'a> {
    pub fn new(
        rules: &'a RuleSet,
        corpus: &'a TrafficCorpus,
        matrix: &'a MatchMatrix,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self { rules, corpus, matrix, config }
    }

    pub(crate) fn rule_id(&self, idx: usize) -> &'a str {
        &self.rules.get(idx).rule_id
    }

    /// Transaction ids for the first few members of `set`
    pub(crate) fn evidence_ids<I>(&self, txs: I) -> Vec<String>
    where
        I: IntoIterator<Item = usize>,
    {
        txs.into_iter()
            .take(MAX_EVIDENCE_IDS)
            .map(|tx| self.corpus.id(tx).to_string())
            .collect()
    }

    pub(crate) fn set(&self, idx: usize) -> &'a MatchSet {
        self.matrix.set(idx)
    }

    /// Reject NaN or infinite metrics instead of emitting them
    pub(crate) fn finite(
        &self,
        kind: RelationshipType,
        a: usize,
        b: usize,
        name: &str,
        value: f64,
    ) -> Result<f64> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(RulemeshError::detector(
                kind.code(),
                self.rule_id(a),
                self.rule_id(b),
                format!("{} is not finite ({})", name, value),
            ))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::analyzer::CancellationToken;
    use crate::corpus::TransactionRecord;
    use crate::ruleset::RuleRecord;

    /// Owned inputs for building a `DetectionContext` in tests
    pub(crate) struct Fixture {
        pub rules: RuleSet,
        pub corpus: TrafficCorpus,
        pub matrix: MatchMatrix,
        pub config: AnalysisConfig,
    }

    impl Fixture {
        pub(crate) fn new(rules: &[RuleRecord], uris: &[&str]) -> Self {
            let config = AnalysisConfig::default();
            let rules = RuleSet::from_records(rules, &config).unwrap();
            let records: Vec<TransactionRecord> = uris.iter().map(|u| TransactionRecord::new(*u)).collect();
            let corpus = TrafficCorpus::from_records(&records).unwrap();
            let matrix = MatchMatrix::build(&rules, &corpus, &CancellationToken::new()).unwrap();
            Self { rules, corpus, matrix, config }
        }

        pub(crate) fn ctx(&self) -> DetectionContext<'_> {
            DetectionContext::new(&self.rules, &self.corpus, &self.matrix, &self.config)
        }

        pub(crate) fn idx(&self, rule_id: &str) -> usize {
            self.rules.find(rule_id).unwrap()
        }
    }
}
