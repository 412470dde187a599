use crate::error::{Result, RulemeshError};

/// Defaults applied to rule records that omit optional fields
pub const DEFAULT_PHASE: i64 = 2;
pub const DEFAULT_PRIORITY: i64 = 1000;

/// Shadowing: fraction of rule_b's matches that must already be blocked
pub const SHADOW_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Redundancy: both the overlap ratio and the jaccard index must exceed these
pub const REDUNDANCY_CO_OCCURRENCE_THRESHOLD: f64 = 0.85;
pub const REDUNDANCY_JACCARD_THRESHOLD: f64 = 0.7;

/// Correlation: minimum shared transactions and lift
pub const CORRELATION_MIN_SUPPORT: usize = 3;
pub const CORRELATION_LIFT_THRESHOLD: f64 = 2.0;

/// Subsumption / containment fuzzing
pub const DEFAULT_CONTAINMENT_THRESHOLD: f64 = 0.99;
pub const DEFAULT_SAMPLE_FUZZ_TRIALS: usize = 200;
pub const FUZZ_SAMPLE_LIMIT: usize = 200;
pub const RANDOM_FUZZ_TRIALS_CAP: usize = 50;
pub const RANDOM_FUZZ_MIN_LEN: usize = 5;
pub const RANDOM_FUZZ_MAX_LEN: usize = 40;
pub const RANDOM_FUZZ_MIN_CHAR: u8 = 33;
pub const RANDOM_FUZZ_MAX_CHAR: u8 = 126;
pub const DEFAULT_FUZZ_SEED: u64 = 0x5EED_0F_F022;

/// Reporting limits
pub const MAX_EVIDENCE_IDS: usize = 10;
pub const SAMPLE_RULE_IDS: usize = 10;

/// Compiled program size limit for a single rule pattern (bytes)
pub const DEFAULT_PATTERN_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Backtracking steps allowed per match attempt for lookaround/backreference patterns
pub const DEFAULT_BACKTRACK_LIMIT: usize = 1_000_000;

/// Tunables for one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Maximum number of spec-rule samples tested per containment direction
    pub sample_fuzz_trials: usize,
    /// Combined containment score required for a SUB relationship
    pub containment_threshold: f64,
    /// Seed for the random-string fuzz branch
    pub fuzz_seed: u64,
    /// Size limit handed to the regex compiler for each pattern
    pub pattern_size_limit: usize,
    /// A match attempt exceeding this counts as a non-hit for that transaction
    pub backtrack_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_fuzz_trials: DEFAULT_SAMPLE_FUZZ_TRIALS,
            containment_threshold: DEFAULT_CONTAINMENT_THRESHOLD,
            fuzz_seed: DEFAULT_FUZZ_SEED,
            pattern_size_limit: DEFAULT_PATTERN_SIZE_LIMIT,
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
        }
    }
}

impl AnalysisConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sample_fuzz_trials(mut self, trials: usize) -> Self {
        self.sample_fuzz_trials = trials;
        self
    }

    #[must_use]
    pub fn with_containment_threshold(mut self, threshold: f64) -> Self {
        self.containment_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_fuzz_seed(mut self, seed: u64) -> Self {
        self.fuzz_seed = seed;
        self
    }

    #[must_use]
    pub fn with_pattern_size_limit(mut self, limit: usize) -> Self {
        self.pattern_size_limit = limit;
        self
    }

    #[must_use]
    pub fn with_backtrack_limit(mut self, limit: usize) -> Self {
        self.backtrack_limit = limit;
        self
    }

    /// Validate the configuration and return errors for invalid settings
    pub fn validate(&self) -> Result<()> {
        if self.sample_fuzz_trials == 0 {
            return Err(RulemeshError::configuration("sample_fuzz_trials must be greater than 0"));
        }
        if !self.containment_threshold.is_finite()
            || self.containment_threshold <= 0.0
            || self.containment_threshold > 1.0
        {
            return Err(RulemeshError::configuration(format!(
                "containment_threshold must be in (0, 1], got {}",
                self.containment_threshold
            )));
        }
        if self.pattern_size_limit == 0 {
            return Err(RulemeshError::configuration("pattern_size_limit must be greater than 0"));
        }
        if self.backtrack_limit == 0 {
            return Err(RulemeshError::configuration("backtrack_limit must be greater than 0"));
        }
        Ok(())
    }
}
