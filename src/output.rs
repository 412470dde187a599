//! Output formatting and reporting.
//!
//! - Human-readable terminal output with colors
//! - Pretty JSON for machine consumption
//!
//! Both are provided for the full relationship report and for the per-rule hit table.

use crate::matrix::MatchMatrix;
use crate::ruleset::{CompileStatus, RuleSet};
use crate::types::{AnalysisReport, Relationship, RelationshipType};
use anyhow::Result;
use colored::{ColoredString, Colorize};
use serde::Serialize;

/// One line of the `matrix` command output, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleHitRow {
    pub rule_id: String,
    pub phase: i64,
    pub priority: i64,
    pub action: String,
    pub compile_status: CompileStatus,
    pub hits: usize,
}

pub fn rule_hit_rows(rules: &RuleSet, matrix: &MatchMatrix) -> Vec<RuleHitRow> {
    rules
        .execution_order()
        .iter()
        .map(|&idx| {
            let rule = rules.get(idx);
            RuleHitRow {
                rule_id: rule.rule_id.clone(),
                phase: rule.phase,
                priority: rule.priority,
                action: rule.action.clone(),
                compile_status: rule.compile_status,
                hits: matrix.set(idx).len(),
            }
        })
        .collect()
}

/// Format analysis report as JSON
pub fn format_json(report: &AnalysisReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn format_hits_json(rows: &[RuleHitRow]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

fn type_color(kind: RelationshipType) -> ColoredString {
    let label = format!("[{}]", kind.code());
    match kind {
        RelationshipType::Shadowing => label.bright_red().bold(),
        RelationshipType::Redundancy => label.bright_yellow().bold(),
        RelationshipType::Correlation => label.bright_cyan(),
        RelationshipType::Subsumption => label.bright_magenta(),
    }
}

fn format_relationship(rel: &Relationship, output: &mut String) {
    let arrow = match rel.relationship_type {
        RelationshipType::Shadowing | RelationshipType::Subsumption => "→",
        _ => "↔",
    };
    output.push_str(&format!(
        "│  {} {} {} {}  {}\n",
        type_color(rel.relationship_type),
        rel.participants.first().bright_white(),
        arrow,
        rel.participants.second().bright_white(),
        format!("conf {:.2}", rel.confidence).bright_black()
    ));
    output.push_str(&format!("│       {}\n", rel.description));

    if !rel.evidence_tx_ids.is_empty() {
        output.push_str(&format!(
            "│       {} {}\n",
            "evidence:".bright_black(),
            rel.evidence_tx_ids.join(", ").bright_black()
        ));
    }
    for note in rel.conflicting_fields.values() {
        output.push_str(&format!("│       {} {}\n", "note:".bright_black(), note));
    }
    if let Some(suggestion) = &rel.suggestion {
        output.push_str(&format!("│       {} {}\n", "suggestion:".green(), suggestion.italic()));
    }
}

/// Format analysis report for terminal display
pub fn format_terminal(report: &AnalysisReport) -> Result<String> {
    let mut output = String::new();

    output.push_str(&format!(
        "├─ {} rules, {} relationships\n",
        report.total_rules.to_string().bright_white().bold(),
        report.total_relationships.to_string().bright_white().bold()
    ));
    let counts: Vec<String> = report
        .per_type_counts
        .iter()
        .map(|(kind, n)| format!("{} {}", kind.code(), n))
        .collect();
    output.push_str(&format!("│  {}\n", counts.join("  ").bright_black()));
    output.push_str("│\n");

    for (kind, rels) in &report.relationships_by_type {
        if rels.is_empty() {
            continue;
        }
        output.push_str(&format!("├─ {} ({})\n", kind.label().bright_white(), rels.len()));
        for rel in rels {
            format_relationship(rel, &mut output);
        }
        output.push_str("│\n");
    }

    output.push_str(&format!("├─ {}\n", "Recommendations".bright_white()));
    for rec in &report.recommendations {
        output.push_str(&format!("│  • {}\n", rec.kind.bold()));
        output.push_str(&format!("│    {}\n", rec.description));
        output.push_str(&format!("│    {}\n", rec.impact.italic()));
    }

    if report.enrichment.available || report.enrichment.error.is_some() {
        output.push_str("│\n");
        match &report.enrichment.error {
            Some(err) => output.push_str(&format!(
                "│  {} enrichment via {} failed: {}\n",
                "!".bright_yellow(),
                report.enrichment.enricher,
                err
            )),
            None => output.push_str(&format!(
                "│  enrichment via {}: {} suggestions\n",
                report.enrichment.enricher, report.enrichment.enriched
            )),
        }
    }

    output.push_str("│\n");
    Ok(output)
}

/// Format the per-rule hit table for terminal display
pub fn format_hits_terminal(rows: &[RuleHitRow], transaction_count: usize) -> Result<String> {
    let mut output = String::new();
    output.push_str(&format!(
        "├─ {} rules × {} transactions\n",
        rows.len().to_string().bright_white().bold(),
        transaction_count.to_string().bright_white().bold()
    ));
    output.push_str("│\n");

    let width = rows.iter().map(|r| r.rule_id.len()).max().unwrap_or(0);
    for row in rows {
        let status = match row.compile_status {
            CompileStatus::Regex => row.compile_status.as_str().normal(),
            CompileStatus::EscapedLiteral => row.compile_status.as_str().bright_yellow(),
            CompileStatus::Failed => row.compile_status.as_str().bright_red(),
        };
        let hits = if row.hits == 0 {
            row.hits.to_string().bright_black()
        } else {
            row.hits.to_string().bright_white()
        };
        output.push_str(&format!(
            "│  {:<width$}  {:>3}/{:<5}  {:<8} {:>6}  {}\n",
            row.rule_id,
            row.phase,
            row.priority,
            row.action,
            hits,
            status,
            width = width
        ));
    }

    output.push_str("│\n");
    Ok(output)
}
