//! Relationship and report types.
//!
//! Everything here is plain data: detectors create `Relationship`s, the aggregator
//! groups them into an `AnalysisReport`, and `output` renders that report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of pairwise relationship between two rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// An earlier blocking rule hides a later rule's matches
    #[serde(rename = "SHD")]
    Shadowing,
    /// Two rules fire on nearly the same traffic
    #[serde(rename = "RXD")]
    Redundancy,
    /// Two rules co-fire more often than independence predicts
    #[serde(rename = "COR")]
    Correlation,
    /// One rule's language (approximately) contains another's
    #[serde(rename = "SUB")]
    Subsumption,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 4] = [
        RelationshipType::Shadowing,
        RelationshipType::Redundancy,
        RelationshipType::Correlation,
        RelationshipType::Subsumption,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            RelationshipType::Shadowing => "SHD",
            RelationshipType::Redundancy => "RXD",
            RelationshipType::Correlation => "COR",
            RelationshipType::Subsumption => "SUB",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationshipType::Shadowing => "shadowing",
            RelationshipType::Redundancy => "redundancy",
            RelationshipType::Correlation => "correlation",
            RelationshipType::Subsumption => "subsumption",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL.into_iter().find(|t| t.code().eq_ignore_ascii_case(code))
    }

    /// Parse requested type codes. Unknown codes are ignored; the result is
    /// deduplicated and in canonical order.
    pub fn parse_list<S: AsRef<str>>(codes: &[S]) -> Vec<Self> {
        let mut types: Vec<Self> = codes.iter().filter_map(|c| Self::from_code(c.as_ref())).collect();
        types.sort();
        types.dedup();
        types
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The two rules a relationship is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Participants {
    /// SHD/RXD/COR: `rule_a` executes no later than `rule_b`
    Pair { rule_a: String, rule_b: String },
    /// SUB: `subsuming_rule` approximately contains `subsumed_rule`
    Containment { subsuming_rule: String, subsumed_rule: String },
}

impl Participants {
    pub fn pair(rule_a: impl Into<String>, rule_b: impl Into<String>) -> Self {
        Participants::Pair { rule_a: rule_a.into(), rule_b: rule_b.into() }
    }

    pub fn containment(subsuming: impl Into<String>, subsumed: impl Into<String>) -> Self {
        Participants::Containment { subsuming_rule: subsuming.into(), subsumed_rule: subsumed.into() }
    }

    pub fn first(&self) -> &str {
        match self {
            Participants::Pair { rule_a, .. } => rule_a,
            Participants::Containment { subsuming_rule, .. } => subsuming_rule,
        }
    }

    pub fn second(&self) -> &str {
        match self {
            Participants::Pair { rule_b, .. } => rule_b,
            Participants::Containment { subsumed_rule, .. } => subsumed_rule,
        }
    }
}

/// A detected relationship between two rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub relationship_type: RelationshipType,
    #[serde(flatten)]
    pub participants: Participants,
    pub confidence: f64,
    pub evidence_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_tx_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_occurrence_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jaccard: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lift: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conflicting_fields: BTreeMap<String, String>,
    pub description: String,
    /// Filled in by a `RelationshipEnricher`, never by the detectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Relationship {
    pub fn new(
        relationship_type: RelationshipType,
        participants: Participants,
        confidence: f64,
        evidence_count: usize,
        description: String,
    ) -> Self {
        Self {
            relationship_type,
            participants,
            confidence,
            evidence_count,
            evidence_tx_ids: Vec::new(),
            co_occurrence_rate: None,
            jaccard: None,
            lift: None,
            conflicting_fields: BTreeMap::new(),
            description,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence_tx_ids: Vec<String>) -> Self {
        self.evidence_tx_ids = evidence_tx_ids;
        self
    }

    #[must_use]
    pub fn with_conflicting_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.conflicting_fields = fields;
        self
    }
}

/// Template recommendation derived from the relationship counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub impact: String,
}

/// Outcome of the optional enrichment step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentStatus {
    pub enricher: String,
    pub available: bool,
    pub enriched: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub total_rules: usize,
    pub total_relationships: usize,
    pub relationships_by_type: BTreeMap<RelationshipType, Vec<Relationship>>,
    pub per_type_counts: BTreeMap<RelationshipType, usize>,
    pub recommendations: Vec<Recommendation>,
    pub sample_rule_ids: Vec<String>,
    pub hit_counts: BTreeMap<String, usize>,
    pub enrichment: EnrichmentStatus,
}

impl AnalysisReport {
    pub fn of_type(&self, kind: RelationshipType) -> &[Relationship] {
        self.relationships_by_type.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, kind: RelationshipType) -> usize {
        self.per_type_counts.get(&kind).copied().unwrap_or(0)
    }

    /// All relationships, grouped by type in canonical type order
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships_by_type.values().flatten()
    }
}
