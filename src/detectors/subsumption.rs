//! Subsumption (SUB): one rule's language is (approximately) a superset of another's.

use super::fuzzer::{seeded_rng, ContainmentFuzzer};
use super::{DetectionContext, PairDetector};
use crate::error::Result;
use crate::matrix::MatchSet;
use crate::types::{Participants, Relationship, RelationshipType};

/// |X∩Y| / |Y|, or `None` when Y matched nothing (vacuous containment is rejected).
pub fn traffic_containment(x: &MatchSet, y: &MatchSet) -> Option<f64> {
    if y.is_empty() {
        return None;
    }
    Some(x.intersection_count(y) as f64 / y.len() as f64)
}

/// Test both directions independently; either, both or neither may hold.
pub fn detect_subsumption(
    ctx: &DetectionContext<'_>,
    fuzzer: &ContainmentFuzzer,
    a: usize,
    b: usize,
) -> Result<Vec<Relationship>> {
    let mut found = Vec::with_capacity(2);
    for (x, y) in [(a, b), (b, a)] {
        if let Some(rel) = contains(ctx, fuzzer, x, y)? {
            found.push(rel);
        }
    }
    Ok(found)
}

/// Does rule `x` contain rule `y`?
fn contains(
    ctx: &DetectionContext<'_>,
    fuzzer: &ContainmentFuzzer,
    x: usize,
    y: usize,
) -> Result<Option<Relationship>> {
    let (set_x, set_y) = (ctx.set(x), ctx.set(y));
    let Some(traffic) = traffic_containment(set_x, set_y) else {
        return Ok(None);
    };

    let (id_x, id_y) = (ctx.rule_id(x), ctx.rule_id(y));
    let mut rng = seeded_rng(ctx.config.fuzz_seed, id_x, id_y);
    let fuzzed = fuzzer.containment(ctx.rules.get(x), set_y, ctx.corpus, &mut rng);

    let combined = traffic.max(fuzzed);
    let combined = ctx.finite(RelationshipType::Subsumption, x, y, "containment", combined)?;
    if combined < ctx.config.containment_threshold {
        return Ok(None);
    }

    let evidence = ctx.evidence_ids(ctx.matrix.common_transactions(x, y).iter());
    let description = format!(
        "Rule {} likely subsumes (generalizes) rule {} (confidence {:.2}).",
        id_x, id_y, combined
    );

    Ok(Some(
        Relationship::new(
            RelationshipType::Subsumption,
            Participants::containment(id_x, id_y),
            combined,
            evidence.len(),
            description,
        )
        .with_evidence(evidence)
        .with_conflicting_fields(ctx.rules.conflicting_fields(x, y)),
    ))
}

/// SUB in both directions, fuzzing with `fuzzer`
#[derive(Debug, Clone, Copy)]
pub struct SubsumptionDetector {
    fuzzer: ContainmentFuzzer,
}

impl SubsumptionDetector {
    pub fn new(fuzzer: ContainmentFuzzer) -> Self {
        Self { fuzzer }
    }
}

impl PairDetector for SubsumptionDetector {
    fn kind(&self) -> RelationshipType {
        RelationshipType::Subsumption
    }

    fn detect(&self, ctx: &DetectionContext<'_>, a: usize, b: usize) -> Result<Vec<Relationship>> {
        detect_subsumption(ctx, &self.fuzzer, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::Fixture;
    use crate::ruleset::RuleRecord;

    #[test]
    fn test_general_rule_subsumes_specific() {
        let fx = Fixture::new(
            &[
                RuleRecord::new("general", "etc/", "block"),
                RuleRecord::new("specific", "etc/passwd", "block"),
            ],
            &["/etc/passwd", "/x/etc/passwd", "/etc/shadow", "/etc/hosts", "/home"],
        );
        let found = detect_subsumption(&fx.ctx(), &ContainmentFuzzer::new(200), 0, 1).unwrap();
        assert_eq!(found.len(), 1);
        let rel = &found[0];
        assert_eq!(rel.participants, Participants::containment("general", "specific"));
        assert_eq!(rel.confidence, 1.0);
        assert_eq!(rel.evidence_tx_ids, vec!["0".to_string(), "1".to_string()]);
        assert_eq!(rel.evidence_count, 2);
    }

    #[test]
    fn test_equivalent_rules_subsume_both_ways() {
        let fx = Fixture::new(
            &[RuleRecord::new("a", "cmd=", "block"), RuleRecord::new("b", "cmd=", "log")],
            &["/?cmd=ls", "/?cmd=id"],
        );
        let found = detect_subsumption(&fx.ctx(), &ContainmentFuzzer::new(200), 0, 1).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].participants.first(), "a");
        assert_eq!(found[1].participants.first(), "b");
    }

    #[test]
    fn test_empty_subsumed_set_rejected() {
        // "catch_all" matches everything, "never" matches nothing
        let fx = Fixture::new(
            &[RuleRecord::new("catch_all", "", "block"), RuleRecord::new("never", "^zzz$", "block")],
            &["/a", "/b"],
        );
        let found = detect_subsumption(&fx.ctx(), &ContainmentFuzzer::new(200), 0, 1).unwrap();
        assert!(found.iter().all(|r| r.participants.second() != "never"));
    }

    #[test]
    fn test_traffic_containment() {
        let x: MatchSet = vec![1, 2, 3].into_iter().collect();
        let y: MatchSet = vec![2, 3, 4, 5].into_iter().collect();
        assert_eq!(traffic_containment(&x, &y), Some(0.5));
        assert_eq!(traffic_containment(&x, &MatchSet::default()), None);
    }

    #[test]
    fn test_threshold_from_config() {
        let mut fx = Fixture::new(
            &[RuleRecord::new("wide", "a", "block"), RuleRecord::new("narrow", "ab", "block")],
            &["ab", "abc", "ca"],
        );
        fx.config = fx.config.clone().with_containment_threshold(1.0);
        let found = detect_subsumption(&fx.ctx(), &ContainmentFuzzer::new(200), 0, 1).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].participants.first(), "wide");
    }
}
