//! Normalized rules and the per-run rule arena.

use super::compile::{compile_pattern, flags_case_insensitive, CompileStatus};
use super::record::RuleRecord;
use crate::config::{AnalysisConfig, DEFAULT_PHASE, DEFAULT_PRIORITY};
use crate::error::{Result, RulemeshError};
use fancy_regex::Regex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Actions that stop a request when the rule fires
const BLOCKING_ACTIONS: &[&str] = &["block", "blocked", "deny"];

pub fn is_blocking_action(action: &str) -> bool {
    let action = action.to_lowercase();
    BLOCKING_ACTIONS.contains(&action.as_str())
}

/// A rule with defaults applied and its matcher compiled
#[derive(Debug)]
pub struct Rule {
    pub rule_id: String,
    pub pattern: String,
    pub phase: i64,
    pub priority: i64,
    pub action: String,
    pub flags: String,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub compile_status: CompileStatus,
    matcher: Option<Regex>,
}

impl Rule {
    pub(crate) fn compiled(record: &RuleRecord, config: &AnalysisConfig) -> Self {
        let flags = record.flags.clone().unwrap_or_default();
        let (matcher, compile_status) =
            compile_pattern(&record.rule_id, &record.pattern, flags_case_insensitive(&flags), config);
        Self::assemble(record, flags, matcher, compile_status)
    }

    /// A rule whose pattern could not be compiled in any form
    #[cfg(test)]
    pub(crate) fn uncompiled(record: &RuleRecord) -> Self {
        let flags = record.flags.clone().unwrap_or_default();
        Self::assemble(record, flags, None, CompileStatus::Failed)
    }

    fn assemble(
        record: &RuleRecord,
        flags: String,
        matcher: Option<Regex>,
        compile_status: CompileStatus,
    ) -> Self {
        Self {
            rule_id: record.rule_id.clone(),
            pattern: record.pattern.clone(),
            phase: record.phase.unwrap_or(DEFAULT_PHASE),
            priority: record.priority.unwrap_or(DEFAULT_PRIORITY),
            action: record.action.clone(),
            flags,
            category: record.category.clone(),
            severity: record.severity.clone(),
            compile_status,
            matcher,
        }
    }

    /// Execution order key: lower phase first, then lower priority
    pub fn order_key(&self) -> (i64, i64) {
        (self.phase, self.priority)
    }

    pub fn is_blocking(&self) -> bool {
        is_blocking_action(&self.action)
    }

    pub fn has_matcher(&self) -> bool {
        self.matcher.is_some()
    }

    /// Unanchored search of `text`. A rule without a matcher never matches.
    ///
    /// Fails only when the backtracking engine gives up on `text`.
    pub fn try_match(&self, text: &str) -> Result<bool> {
        match &self.matcher {
            Some(re) => re
                .is_match(text)
                .map_err(|err| RulemeshError::matcher(&self.rule_id, err.to_string())),
            None => Ok(false),
        }
    }

    /// Like `try_match`, with a failed attempt counted as a non-hit
    pub fn is_match(&self, text: &str) -> bool {
        self.try_match(text).unwrap_or(false)
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            rule_id: self.rule_id.clone(),
            pattern: self.pattern.clone(),
            action: self.action.clone(),
            phase: self.phase,
            priority: self.priority,
            category: self.category.clone(),
            severity: self.severity.clone(),
        }
    }
}

/// Rule metadata handed to enrichers and printed in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub rule_id: String,
    pub pattern: String,
    pub action: String,
    pub phase: i64,
    pub priority: i64,
    pub category: Option<String>,
    pub severity: Option<String>,
}

/// Immutable arena of normalized rules for one run.
///
/// Rules keep their input position as index. `execution_order` lists those
/// indices sorted by `(phase, priority)`, ties kept in input order.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
    order: Vec<usize>,
    positions: Vec<usize>,
    index: FxHashMap<String, usize>,
}

impl RuleSet {
    /// Validate records, apply defaults and compile every pattern.
    pub fn from_records(records: &[RuleRecord], config: &AnalysisConfig) -> Result<Self> {
        let mut seen = FxHashSet::default();
        for (i, record) in records.iter().enumerate() {
            if record.rule_id.trim().is_empty() {
                return Err(RulemeshError::invalid_rule(i, "rule_id is empty"));
            }
            if !seen.insert(record.rule_id.as_str()) {
                return Err(RulemeshError::duplicate_rule(record.rule_id.clone()));
            }
        }

        let start = std::time::Instant::now();
        let rules: Vec<Rule> = records
            .par_iter()
            .map(|record| Rule::compiled(record, config))
            .collect();
        debug!("Compiled {} rule patterns in {:?}", rules.len(), start.elapsed());

        Ok(Self::arrange(rules))
    }

    /// Index and order rules whose ids are already known to be unique
    pub(crate) fn arrange(rules: Vec<Rule>) -> Self {
        let index: FxHashMap<String, usize> = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.rule_id.clone(), i))
            .collect();

        let mut order: Vec<usize> = (0..rules.len()).collect();
        order.sort_by_key(|&i| rules[i].order_key());

        let mut positions = vec![0; rules.len()];
        for (pos, &idx) in order.iter().enumerate() {
            positions[idx] = pos;
        }

        Self { rules, order, positions, index }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, idx: usize) -> &Rule {
        &self.rules[idx]
    }

    pub fn find(&self, rule_id: &str) -> Option<usize> {
        self.index.get(rule_id).copied()
    }

    pub fn by_id(&self, rule_id: &str) -> Option<&Rule> {
        self.find(rule_id).map(|idx| &self.rules[idx])
    }

    /// Rule indices in execution order
    pub fn execution_order(&self) -> &[usize] {
        &self.order
    }

    /// Position of rule `idx` in execution order
    pub fn position(&self, idx: usize) -> usize {
        self.positions[idx]
    }

    /// True if rule `a` executes strictly before rule `b`
    pub fn precedes(&self, a: usize, b: usize) -> bool {
        self.positions[a] < self.positions[b]
    }

    /// Metadata the two rules share: same category, severity or action.
    pub fn conflicting_fields(&self, a: usize, b: usize) -> BTreeMap<String, String> {
        let (ra, rb) = (&self.rules[a], &self.rules[b]);
        let mut fields = BTreeMap::new();

        if let (Some(ca), Some(cb)) = (non_empty(&ra.category), non_empty(&rb.category)) {
            if ca == cb {
                fields.insert("category".to_string(), format!("Both category: {}", ca));
            }
        }
        if let (Some(sa), Some(sb)) = (non_empty(&ra.severity), non_empty(&rb.severity)) {
            if sa == sb {
                fields.insert("severity".to_string(), format!("Both severity: {}", sa));
            }
        }
        if !ra.action.is_empty() && ra.action == rb.action {
            fields.insert("action".to_string(), format!("Both action: {}", ra.action));
        }

        fields
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
