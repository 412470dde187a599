//! Grouping relationships into the final report.

use crate::config::SAMPLE_RULE_IDS;
use crate::matrix::MatchMatrix;
use crate::ruleset::RuleSet;
use crate::types::{AnalysisReport, EnrichmentStatus, Recommendation, Relationship, RelationshipType};
use std::collections::BTreeMap;
use tracing::debug;

/// Build the report for one run. Enrichment status starts out as "not run".
pub fn compile_results(rules: &RuleSet, matrix: &MatchMatrix, relationships: Vec<Relationship>) -> AnalysisReport {
    let total_relationships = relationships.len();
    let recommendations = generate_recommendations(&relationships);

    let mut relationships_by_type: BTreeMap<RelationshipType, Vec<Relationship>> = BTreeMap::new();
    for rel in relationships {
        relationships_by_type.entry(rel.relationship_type).or_default().push(rel);
    }

    let per_type_counts = RelationshipType::ALL
        .into_iter()
        .map(|kind| (kind, relationships_by_type.get(&kind).map_or(0, Vec::len)))
        .collect();

    let sample_rule_ids = rules
        .rules()
        .iter()
        .take(SAMPLE_RULE_IDS)
        .map(|r| r.rule_id.clone())
        .collect();

    debug!("Compiled report: {} relationships over {} rules", total_relationships, rules.len());

    AnalysisReport {
        total_rules: rules.len(),
        total_relationships,
        relationships_by_type,
        per_type_counts,
        recommendations,
        sample_rule_ids,
        hit_counts: matrix.hit_counts(rules),
        enrichment: EnrichmentStatus::default(),
    }
}

fn recommendation(kind: &str, description: String, impact: &str) -> Recommendation {
    Recommendation {
        kind: kind.to_string(),
        description,
        impact: impact.to_string(),
    }
}

/// Template recommendations from the per-type counts.
///
/// Correlation only produces advice when nothing more actionable was found.
pub fn generate_recommendations(relationships: &[Relationship]) -> Vec<Recommendation> {
    let count = |kind: RelationshipType| relationships.iter().filter(|r| r.relationship_type == kind).count();
    let mut recs = Vec::new();

    let shadowed = count(RelationshipType::Shadowing);
    if shadowed > 0 {
        recs.push(recommendation(
            "Remove/Review Shadowed Rules",
            format!("{} rules appear shadowed by earlier blocking rules. Review before removal.", shadowed),
            "Performance improvement likely; verify behaviour with canary tests.",
        ));
    }

    let redundant = count(RelationshipType::Redundancy);
    if redundant > 0 {
        recs.push(recommendation(
            "Merge/Consolidate Redundant Rules",
            format!(
                "{} redundant pairs found. Consider merging patterns or removing duplicates.",
                redundant
            ),
            "Simplicity & maintenance reduction.",
        ));
    }

    let subsumed = count(RelationshipType::Subsumption);
    if subsumed > 0 {
        recs.push(recommendation(
            "Specialize or Keep Specific Rules",
            format!(
                "{} subsumption cases. Consider keeping specialized rules if they provide different \
                 actions or clearer diagnostic messages.",
                subsumed
            ),
            "Avoid losing fine-grained detection.",
        ));
    }

    let correlated = count(RelationshipType::Correlation);
    if correlated > 0 && recs.is_empty() {
        recs.push(recommendation(
            "Review Correlated Rules",
            format!(
                "{} correlated relationships. Review for potential tuning or ordering changes.",
                correlated
            ),
            "Potential performance/security tuning.",
        ));
    }

    if recs.is_empty() {
        recs.push(recommendation(
            "No obvious optimizations found",
            "No high-confidence relationships detected with current thresholds.".to_string(),
            "No immediate action recommended.",
        ));
    }

    recs
}
