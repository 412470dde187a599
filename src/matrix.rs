//! Rule × transaction match matrix.
//!
//! Every compiled rule is run against every transaction's combined text once per
//! run. Rules are evaluated in parallel; each rule's set is produced by a single
//! worker, so no locking is involved.

use crate::analyzer::CancellationToken;
use crate::corpus::TrafficCorpus;
use crate::error::{Result, RulemeshError};
use crate::ruleset::RuleSet;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Sorted, deduplicated set of transaction indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet(Vec<usize>);

impl MatchSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tx: usize) -> bool {
        self.0.binary_search(&tx).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn intersection(&self, other: &MatchSet) -> MatchSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].cmp(&other.0[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    out.push(self.0[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        MatchSet(out)
    }

    pub fn intersection_count(&self, other: &MatchSet) -> usize {
        let (mut i, mut j, mut count) = (0, 0, 0);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].cmp(&other.0[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    count += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        count
    }

    pub fn union_count(&self, other: &MatchSet) -> usize {
        self.len() + other.len() - self.intersection_count(other)
    }
}

impl FromIterator<usize> for MatchSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut v: Vec<usize> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        MatchSet(v)
    }
}

/// rule → set(transaction), indexed by rule position in the `RuleSet`
#[derive(Debug)]
pub struct MatchMatrix {
    sets: Vec<MatchSet>,
    transaction_count: usize,
}

impl MatchMatrix {
    /// Evaluate every rule against every transaction.
    ///
    /// Rules without a compiled matcher get an empty set. A transaction the matcher
    /// gives up on counts as a non-hit for that rule only.
    pub fn build(rules: &RuleSet, corpus: &TrafficCorpus, cancel: &CancellationToken) -> Result<Self> {
        let start = std::time::Instant::now();

        let sets: Vec<MatchSet> = rules
            .rules()
            .par_iter()
            .map(|rule| {
                if !rule.has_matcher() || cancel.is_cancelled() {
                    return MatchSet::default();
                }
                let mut failures = 0usize;
                let set: MatchSet = corpus
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, tx)| match rule.try_match(&tx.text) {
                        Ok(hit) => hit.then_some(idx),
                        Err(err) => {
                            debug!("Transaction {}: {}", tx.transaction_id, err);
                            failures += 1;
                            None
                        }
                    })
                    .collect();
                if failures > 0 {
                    warn!(
                        "Rule {}: matching failed on {} transactions, counted as non-hits",
                        rule.rule_id, failures
                    );
                }
                set
            })
            .collect();

        if cancel.is_cancelled() {
            return Err(RulemeshError::Cancelled);
        }

        debug!(
            "Built {}x{} match matrix in {:?}",
            rules.len(),
            corpus.len(),
            start.elapsed()
        );

        Ok(Self { sets, transaction_count: corpus.len() })
    }

    pub fn set(&self, rule_idx: usize) -> &MatchSet {
        &self.sets[rule_idx]
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_count
    }

    /// Transactions matched by both rules
    pub fn common_transactions(&self, a: usize, b: usize) -> MatchSet {
        let common = self.sets[a].intersection(&self.sets[b]);
        trace!("Common requests between rule #{} and rule #{}: {}", a, b, common.len());
        common
    }

    /// Number of matched transactions per rule id
    pub fn hit_counts(&self, rules: &RuleSet) -> BTreeMap<String, usize> {
        rules
            .rules()
            .iter()
            .zip(&self.sets)
            .map(|(rule, set)| (rule.rule_id.clone(), set.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::corpus::TransactionRecord;
    use crate::ruleset::{Rule, RuleRecord};

    fn fixture() -> (RuleSet, TrafficCorpus) {
        let config = AnalysisConfig::default();
        let mut rules: Vec<Rule> = [
            RuleRecord::new("sqli", "(?i)union\\s+select", "block"),
            RuleRecord::new("ua", "sqlmap", "block"),
            RuleRecord::new("data", "passwd", "log"),
        ]
        .iter()
        .map(|record| Rule::compiled(record, &config))
        .collect();
        rules.push(Rule::uncompiled(&RuleRecord::new("broken", "select", "block")));
        let rules = RuleSet::arrange(rules);
        let corpus = TrafficCorpus::from_records(&[
            TransactionRecord::new("/q?id=1 UNION SELECT pw").with_user_agent("sqlmap/1.7"),
            TransactionRecord::new("/etc").with_matched_data("/etc/passwd"),
            TransactionRecord::new("/home").with_user_agent("Mozilla/5.0"),
            TransactionRecord::new("/q?id=union  select 2"),
        ])
        .unwrap();
        (rules, corpus)
    }

    #[test]
    fn test_matrix_cells() {
        let (rules, corpus) = fixture();
        let matrix = MatchMatrix::build(&rules, &corpus, &CancellationToken::new()).unwrap();
        let cell = |id: &str| matrix.set(rules.find(id).unwrap()).as_slice().to_vec();
        assert_eq!(cell("sqli"), vec![0, 3]);
        assert_eq!(cell("ua"), vec![0]);
        assert_eq!(cell("data"), vec![1]);
        assert!(cell("broken").is_empty());
        assert_eq!(matrix.transaction_count(), 4);
    }

    #[test]
    fn test_hit_counts() {
        let (rules, corpus) = fixture();
        let matrix = MatchMatrix::build(&rules, &corpus, &CancellationToken::new()).unwrap();
        let hits = matrix.hit_counts(&rules);
        assert_eq!(hits["sqli"], 2);
        assert_eq!(hits["broken"], 0);
    }

    #[test]
    fn test_common_transactions() {
        let (rules, corpus) = fixture();
        let matrix = MatchMatrix::build(&rules, &corpus, &CancellationToken::new()).unwrap();
        assert_eq!(matrix.common_transactions(0, 1).as_slice(), &[0]);
        assert!(matrix.common_transactions(1, 2).is_empty());
    }

    #[test]
    fn test_matcher_failure_skips_only_that_cell() {
        let config = AnalysisConfig::default().with_backtrack_limit(1000);
        let rules = RuleSet::arrange(vec![
            Rule::compiled(&RuleRecord::new("runaway", "(a|b|ab)*(?=c)", "block"), &config),
            Rule::compiled(&RuleRecord::new("plain", "ab", "log"), &config),
        ]);
        let corpus = TrafficCorpus::from_records(&[
            TransactionRecord::new("c"),
            TransactionRecord::new("ab".repeat(28)),
        ])
        .unwrap();

        assert!(rules.get(0).try_match(corpus.text(1)).is_err());
        assert!(!rules.get(0).is_match(corpus.text(1)));

        let matrix = MatchMatrix::build(&rules, &corpus, &CancellationToken::new()).unwrap();
        assert_eq!(matrix.set(0).as_slice(), &[0]);
        assert_eq!(matrix.set(1).as_slice(), &[1]);
    }

    #[test]
    fn test_cancelled_build() {
        let (rules, corpus) = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = MatchMatrix::build(&rules, &corpus, &cancel).unwrap_err();
        assert!(matches!(err, RulemeshError::Cancelled));
    }

    #[test]
    fn test_set_operations() {
        let a: MatchSet = vec![5, 1, 3, 3, 9].into_iter().collect();
        let b: MatchSet = vec![3, 4, 5].into_iter().collect();
        assert_eq!(a.as_slice(), &[1, 3, 5, 9]);
        assert_eq!(a.intersection(&b).as_slice(), &[3, 5]);
        assert_eq!(a.intersection_count(&b), 2);
        assert_eq!(b.intersection_count(&a), 2);
        assert_eq!(a.union_count(&b), 5);
        assert!(a.contains(9));
        assert!(!a.contains(4));
    }
}
