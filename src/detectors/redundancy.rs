//! Redundancy (RXD): two rules fire on nearly identical traffic.

use super::{DetectionContext, PairDetector};
use crate::config::{REDUNDANCY_CO_OCCURRENCE_THRESHOLD, REDUNDANCY_JACCARD_THRESHOLD};
use crate::error::Result;
use crate::matrix::MatchSet;
use crate::types::{Participants, Relationship, RelationshipType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedundancyMetrics {
    pub intersection: usize,
    pub union: usize,
    /// |A∩B| / max(1, min(|A|, |B|))
    pub co_occurrence_rate: f64,
    /// |A∩B| / |A∪B|, 0 when both sets are empty
    pub jaccard: f64,
}

/// Symmetric in its arguments.
pub fn redundancy_metrics(a: &MatchSet, b: &MatchSet) -> RedundancyMetrics {
    let intersection = a.intersection_count(b);
    let union = a.len() + b.len() - intersection;
    let co_occurrence_rate = intersection as f64 / a.len().min(b.len()).max(1) as f64;
    let jaccard = if union == 0 { 0.0 } else { intersection as f64 / union as f64 };

    RedundancyMetrics { intersection, union, co_occurrence_rate, jaccard }
}

/// Both the overlap ratio and the jaccard index have to be high: the ratio alone
/// accepts a tiny set inside a huge one, jaccard alone under-scores subsets.
pub fn detect_redundancy(ctx: &DetectionContext<'_>, a: usize, b: usize) -> Result<Option<Relationship>> {
    let (set_a, set_b) = (ctx.set(a), ctx.set(b));
    if set_a.is_empty() && set_b.is_empty() {
        return Ok(None);
    }

    let metrics = redundancy_metrics(set_a, set_b);
    let rate = ctx.finite(RelationshipType::Redundancy, a, b, "co_occurrence_rate", metrics.co_occurrence_rate)?;
    let jaccard = ctx.finite(RelationshipType::Redundancy, a, b, "jaccard", metrics.jaccard)?;

    if rate <= REDUNDANCY_CO_OCCURRENCE_THRESHOLD || jaccard <= REDUNDANCY_JACCARD_THRESHOLD {
        return Ok(None);
    }

    let (id_a, id_b) = (ctx.rule_id(a), ctx.rule_id(b));
    let description = format!(
        "Rules {} and {} trigger together {:.1}% of the time (jaccard {:.2}).",
        id_a,
        id_b,
        rate * 100.0,
        jaccard
    );
    let common = ctx.matrix.common_transactions(a, b);

    let mut rel = Relationship::new(
        RelationshipType::Redundancy,
        Participants::pair(id_a, id_b),
        rate,
        metrics.intersection,
        description,
    )
    .with_evidence(ctx.evidence_ids(common.iter()))
    .with_conflicting_fields(ctx.rules.conflicting_fields(a, b));
    rel.co_occurrence_rate = Some(rate);
    rel.jaccard = Some(jaccard);

    Ok(Some(rel))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RedundancyDetector;

impl PairDetector for RedundancyDetector {
    fn kind(&self) -> RelationshipType {
        RelationshipType::Redundancy
    }

    fn detect(&self, ctx: &DetectionContext<'_>, a: usize, b: usize) -> Result<Vec<Relationship>> {
        Ok(detect_redundancy(ctx, a, b)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::Fixture;
    use crate::ruleset::RuleRecord;

    fn set(v: &[usize]) -> MatchSet {
        v.iter().copied().collect()
    }

    #[test]
    fn test_metrics_symmetric() {
        let a = set(&[1, 2, 3, 4, 5, 6]);
        let b = set(&[4, 5, 6, 7]);
        assert_eq!(redundancy_metrics(&a, &b), redundancy_metrics(&b, &a));
        let m = redundancy_metrics(&a, &b);
        assert_eq!(m.intersection, 3);
        assert_eq!(m.union, 7);
        assert_eq!(m.co_occurrence_rate, 0.75);
    }

    #[test]
    fn test_metrics_empty_sets() {
        let m = redundancy_metrics(&MatchSet::default(), &MatchSet::default());
        assert_eq!(m.co_occurrence_rate, 0.0);
        assert_eq!(m.jaccard, 0.0);
    }

    #[test]
    fn test_subset_of_large_set_not_redundant() {
        // overlap ratio 1.0 but jaccard 0.1
        let a = set(&[1]);
        let b = set(&(0..10).collect::<Vec<_>>());
        let m = redundancy_metrics(&a, &b);
        assert_eq!(m.co_occurrence_rate, 1.0);
        assert!(m.jaccard <= REDUNDANCY_JACCARD_THRESHOLD);
    }

    #[test]
    fn test_detect_identical_rules() {
        let fx = Fixture::new(
            &[
                RuleRecord::new("1", "select", "block").with_category("sqli"),
                RuleRecord::new("2", "SELECT", "block").with_flags("i").with_category("sqli"),
            ],
            &["/select", "/x?select=1", "/home"],
        );
        let rel = detect_redundancy(&fx.ctx(), 0, 1).unwrap().unwrap();
        assert_eq!(rel.relationship_type, RelationshipType::Redundancy);
        assert_eq!(rel.evidence_count, 2);
        assert_eq!(rel.co_occurrence_rate, Some(1.0));
        assert_eq!(rel.conflicting_fields["category"], "Both category: sqli");
        assert!(rel.description.contains("100.0%"));
    }

    #[test]
    fn test_partial_overlap_not_redundant() {
        let fx = Fixture::new(
            &[RuleRecord::new("a", "x", "block"), RuleRecord::new("b", "y", "block")],
            &["x", "xy", "y", "yy"],
        );
        assert!(detect_redundancy(&fx.ctx(), 0, 1).unwrap().is_none());
    }
}
