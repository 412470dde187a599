//! Shadowing (SHD): an earlier blocking rule makes a later rule's matches unobservable.

use super::DetectionContext;
use crate::config::SHADOW_CONFIDENCE_THRESHOLD;
use crate::error::Result;
use crate::matrix::MatchMatrix;
use crate::ruleset::RuleSet;
use crate::types::{Participants, Relationship, RelationshipType};

/// For every transaction, the earliest execution position of a blocking rule that matches it.
///
/// "Some rule before `b` blocks this transaction" then becomes a single comparison
/// instead of a scan over every earlier rule.
#[derive(Debug, Clone)]
pub struct BlockingIndex {
    earliest: Vec<Option<usize>>,
}

impl BlockingIndex {
    pub fn build(rules: &RuleSet, matrix: &MatchMatrix) -> Self {
        let mut earliest = vec![None; matrix.transaction_count()];

        for (pos, &idx) in rules.execution_order().iter().enumerate() {
            if !rules.get(idx).is_blocking() {
                continue;
            }
            for tx in matrix.set(idx).iter() {
                if earliest[tx].is_none() {
                    earliest[tx] = Some(pos);
                }
            }
        }

        Self { earliest }
    }

    /// True if a blocking rule executing before `position` matches `tx`
    pub fn blocked_before(&self, tx: usize, position: usize) -> bool {
        matches!(self.earliest.get(tx), Some(Some(p)) if *p < position)
    }
}

/// SHD(a→b): of the transactions `b` matches, more than 75% are already matched by
/// a blocking rule that runs before `b` (any such rule, not only `a`).
pub fn detect_shadowing(
    ctx: &DetectionContext<'_>,
    blocking: &BlockingIndex,
    a: usize,
    b: usize,
) -> Result<Option<Relationship>> {
    // one-directional: a must run strictly before b
    if !ctx.rules.precedes(a, b) {
        return Ok(None);
    }
    if !ctx.rules.get(a).has_matcher() {
        return Ok(None);
    }

    let set_b = ctx.set(b);
    if set_b.is_empty() {
        return Ok(None);
    }

    let position_b = ctx.rules.position(b);
    let blocked: Vec<usize> = set_b.iter().filter(|&tx| blocking.blocked_before(tx, position_b)).collect();

    let confidence = blocked.len() as f64 / set_b.len() as f64;
    let confidence = ctx.finite(RelationshipType::Shadowing, a, b, "shadow_confidence", confidence)?;

    if confidence <= SHADOW_CONFIDENCE_THRESHOLD || blocked.is_empty() {
        return Ok(None);
    }

    let (id_a, id_b) = (ctx.rule_id(a), ctx.rule_id(b));
    let description = format!(
        "Rule {} (earlier) blocks ~{:.1}% of requests that would match {}.",
        id_a,
        confidence * 100.0,
        id_b
    );

    Ok(Some(
        Relationship::new(
            RelationshipType::Shadowing,
            Participants::pair(id_a, id_b),
            confidence,
            blocked.len(),
            description,
        )
        .with_evidence(ctx.evidence_ids(blocked.iter().copied()))
        .with_conflicting_fields(ctx.rules.conflicting_fields(a, b)),
    ))
}
