//! Optional suggestion text for detected relationships.
//!
//! An enricher sees each relationship together with summaries of both rules and may
//! attach a free-text suggestion. It never adds, removes or rescores relationships.

use crate::error::Result;
use crate::ruleset::{RuleSet, RuleSummary};
use crate::types::{AnalysisReport, EnrichmentStatus, Relationship};
use tracing::{debug, info, warn};

/// Injectable suggestion source
pub trait RelationshipEnricher: Send + Sync {
    fn name(&self) -> &str;

    /// Unavailable enrichers are not called at all
    fn is_available(&self) -> bool {
        true
    }

    fn suggest(&self, relationship: &Relationship, first: &RuleSummary, second: &RuleSummary)
        -> Result<Option<String>>;
}

/// Default enricher: reports itself unavailable and suggests nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnricher;

impl RelationshipEnricher for NoopEnricher {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn suggest(&self, _: &Relationship, _: &RuleSummary, _: &RuleSummary) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Attach suggestions to every relationship in `report`.
///
/// The first failure stops enrichment and is recorded in `report.enrichment`;
/// suggestions already attached and all relationships are kept.
pub fn apply_enrichment(enricher: &dyn RelationshipEnricher, rules: &RuleSet, report: &mut AnalysisReport) {
    let mut status = EnrichmentStatus {
        enricher: enricher.name().to_string(),
        available: enricher.is_available(),
        enriched: 0,
        error: None,
    };

    if !status.available {
        debug!("Enricher '{}' unavailable, skipping", status.enricher);
        report.enrichment = status;
        return;
    }

    'outer: for rels in report.relationships_by_type.values_mut() {
        for rel in rels.iter_mut() {
            let (Some(first), Some(second)) = (
                rules.by_id(rel.participants.first()),
                rules.by_id(rel.participants.second()),
            ) else {
                continue;
            };

            match enricher.suggest(rel, &first.summary(), &second.summary()) {
                Ok(Some(text)) => {
                    rel.suggestion = Some(text);
                    status.enriched += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("Enricher '{}' failed: {}", status.enricher, err);
                    status.available = false;
                    status.error = Some(err.to_string());
                    break 'outer;
                }
            }
        }
    }

    info!("Enricher '{}' attached {} suggestions", status.enricher, status.enriched);
    report.enrichment = status;
}
