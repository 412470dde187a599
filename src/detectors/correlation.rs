//! Correlation (COR): two rules co-fire more often than independence predicts.

use super::{DetectionContext, PairDetector};
use crate::config::{CORRELATION_LIFT_THRESHOLD, CORRELATION_MIN_SUPPORT};
use crate::error::Result;
use crate::matrix::MatchSet;
use crate::types::{Participants, Relationship, RelationshipType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationMetrics {
    pub intersection: usize,
    pub actual: f64,
    pub expected: f64,
    pub lift: f64,
}

/// Lift of the pair over a corpus of `corpus_size` transactions.
///
/// Returns `None` when the expected co-occurrence is zero (either set empty).
pub fn correlation_metrics(a: &MatchSet, b: &MatchSet, corpus_size: usize) -> Option<CorrelationMetrics> {
    let total = corpus_size.max(1) as f64;
    let intersection = a.intersection_count(b);
    let actual = intersection as f64 / total;
    let expected = (a.len() as f64 / total) * (b.len() as f64 / total);
    if expected == 0.0 {
        return None;
    }

    Some(CorrelationMetrics { intersection, actual, expected, lift: actual / expected })
}

/// log2(lift)/5 + 0.2, capped at 1.0
pub fn correlation_confidence(lift: f64) -> f64 {
    (lift.log2() / 5.0 + 0.2).min(1.0)
}

pub fn detect_correlation(ctx: &DetectionContext<'_>, a: usize, b: usize) -> Result<Option<Relationship>> {
    let Some(metrics) = correlation_metrics(ctx.set(a), ctx.set(b), ctx.corpus.len()) else {
        return Ok(None);
    };
    let lift = ctx.finite(RelationshipType::Correlation, a, b, "lift", metrics.lift)?;

    if metrics.intersection < CORRELATION_MIN_SUPPORT || lift <= CORRELATION_LIFT_THRESHOLD {
        return Ok(None);
    }

    let confidence = correlation_confidence(lift);
    let (id_a, id_b) = (ctx.rule_id(a), ctx.rule_id(b));
    let description = format!(
        "Rules {} and {} co-occur {} times, lift {:.2}.",
        id_a, id_b, metrics.intersection, lift
    );

    let mut rel = Relationship::new(
        RelationshipType::Correlation,
        Participants::pair(id_a, id_b),
        confidence,
        metrics.intersection,
        description,
    )
    .with_conflicting_fields(ctx.rules.conflicting_fields(a, b));
    rel.lift = Some(lift);

    Ok(Some(rel))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationDetector;

impl PairDetector for CorrelationDetector {
    fn kind(&self) -> RelationshipType {
        RelationshipType::Correlation
    }

    fn detect(&self, ctx: &DetectionContext<'_>, a: usize, b: usize) -> Result<Vec<Relationship>> {
        Ok(detect_correlation(ctx, a, b)?.into_iter().collect())
    }
}
