//! Sampling-based containment oracle.
//!
//! Approximates "does `sub` accept (almost) everything `spec` accepts" without
//! reasoning about the regex languages themselves. When `spec` has real matches,
//! those requests are replayed against `sub`. Without any, random printable
//! probes are used instead, which is a much weaker signal.

use crate::config::{
    AnalysisConfig, FUZZ_SAMPLE_LIMIT, RANDOM_FUZZ_MAX_CHAR, RANDOM_FUZZ_MAX_LEN, RANDOM_FUZZ_MIN_CHAR,
    RANDOM_FUZZ_MIN_LEN, RANDOM_FUZZ_TRIALS_CAP,
};
use crate::corpus::TrafficCorpus;
use crate::matrix::MatchSet;
use crate::ruleset::Rule;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainmentFuzzer {
    trials: usize,
}

impl ContainmentFuzzer {
    pub fn new(trials: usize) -> Self {
        Self { trials }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.sample_fuzz_trials)
    }

    /// Fraction of `spec`'s inputs that `sub` also matches.
    ///
    /// `rng` is only drawn from when `spec_matches` is empty.
    pub fn containment<R: Rng + ?Sized>(
        &self,
        sub: &Rule,
        spec_matches: &MatchSet,
        corpus: &TrafficCorpus,
        rng: &mut R,
    ) -> f64 {
        if spec_matches.is_empty() {
            self.random_containment(sub, rng)
        } else {
            self.sampled_containment(sub, spec_matches, corpus)
        }
    }

    /// Replay up to 200 of `spec`'s matched requests (capped by the trial count).
    pub fn sampled_containment(&self, sub: &Rule, spec_matches: &MatchSet, corpus: &TrafficCorpus) -> f64 {
        let samples: Vec<&str> = spec_matches
            .iter()
            .take(FUZZ_SAMPLE_LIMIT)
            .take(self.trials)
            .map(|tx| corpus.text(tx))
            .collect();
        if samples.is_empty() {
            return 0.0;
        }

        let hits = samples.iter().filter(|text| sub.is_match(text)).count();
        hits as f64 / samples.len() as f64
    }

    /// Test `sub` against at most 50 random printable-ASCII probes.
    pub fn random_containment<R: Rng + ?Sized>(&self, sub: &Rule, rng: &mut R) -> f64 {
        let trials = self.trials.min(RANDOM_FUZZ_TRIALS_CAP);
        let hits = (0..trials).filter(|_| sub.is_match(&random_probe(&mut *rng))).count();
        hits as f64 / trials.max(1) as f64
    }
}

/// A random string of 5-40 characters drawn from codes 33-126
pub fn random_probe<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(RANDOM_FUZZ_MIN_LEN..=RANDOM_FUZZ_MAX_LEN);
    (0..len)
        .map(|_| char::from(rng.gen_range(RANDOM_FUZZ_MIN_CHAR..=RANDOM_FUZZ_MAX_CHAR)))
        .collect()
}

/// RNG for one containment direction, derived from the run seed and both rule ids
/// so results do not depend on which worker evaluates the pair.
pub fn seeded_rng(seed: u64, sub_id: &str, spec_id: &str) -> ChaCha8Rng {
    let mut hasher = FxHasher::default();
    seed.hash(&mut hasher);
    sub_id.hash(&mut hasher);
    spec_id.hash(&mut hasher);
    ChaCha8Rng::seed_from_u64(hasher.finish())
}
