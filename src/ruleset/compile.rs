//! Pattern compilation.
//!
//! Patterns are compiled once per run with `fancy_regex`, so lookaround and
//! backreferences work as WAF authors expect. Patterns without those features are
//! handed straight to the `regex` engine. A pattern that does not parse is retried
//! as an escaped literal so a single bad rule never aborts the analysis.

use crate::config::AnalysisConfig;
use fancy_regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a rule's pattern ended up being compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileStatus {
    /// Compiled as written
    Regex,
    /// Not a valid pattern; compiled as an escaped literal instead
    EscapedLiteral,
    /// Neither form compiled; the rule matches nothing
    Failed,
}

impl CompileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompileStatus::Regex => "regex",
            CompileStatus::EscapedLiteral => "escaped_literal",
            CompileStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Any `i` in the flags string (case-insensitively) turns on case-insensitive matching.
pub fn flags_case_insensitive(flags: &str) -> bool {
    flags.chars().any(|c| c.eq_ignore_ascii_case(&'i'))
}

fn build(pattern: &str, case_insensitive: bool, config: &AnalysisConfig) -> Result<Regex, fancy_regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .delegate_size_limit(config.pattern_size_limit)
        .backtrack_limit(config.backtrack_limit)
        .build()
}

/// Compile `pattern`, falling back to its escaped literal form.
pub fn compile_pattern(
    rule_id: &str,
    pattern: &str,
    case_insensitive: bool,
    config: &AnalysisConfig,
) -> (Option<Regex>, CompileStatus) {
    match build(pattern, case_insensitive, config) {
        Ok(re) => (Some(re), CompileStatus::Regex),
        Err(err) => {
            warn!("Rule {}: invalid pattern, matching it literally instead: {}", rule_id, err);
            match build(&regex::escape(pattern), case_insensitive, config) {
                Ok(re) => (Some(re), CompileStatus::EscapedLiteral),
                Err(err) => {
                    warn!("Rule {}: escaped pattern failed to compile, rule will match nothing: {}", rule_id, err);
                    (None, CompileStatus::Failed)
                }
            }
        }
    }
}
