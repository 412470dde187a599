use thiserror::Error;

/// Errors produced while normalizing inputs and running relationship analysis.
#[derive(Debug, Error)]
pub enum RulemeshError {
    #[error("Transaction #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Invalid rule at position {index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Duplicate rule_id: {rule_id}")]
    DuplicateRule { rule_id: String },

    #[error("Duplicate transaction_id: {transaction_id}")]
    DuplicateTransaction { transaction_id: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{kind} detection failed for {rule_a}/{rule_b}: {message}")]
    Detector {
        kind: String,
        rule_a: String,
        rule_b: String,
        message: String,
    },

    #[error("Rule {rule_id} failed while matching: {message}")]
    Match { rule_id: String, message: String },

    #[error("Enrichment via {enricher} failed: {message}")]
    Enrichment { enricher: String, message: String },

    #[error("Analysis cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, RulemeshError>;

impl RulemeshError {
    pub fn missing_field(index: usize, field: &'static str) -> Self {
        Self::MissingField { index, field }
    }

    pub fn invalid_rule<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::InvalidRule { index, reason: reason.into() }
    }

    pub fn duplicate_rule<S: Into<String>>(rule_id: S) -> Self {
        Self::DuplicateRule { rule_id: rule_id.into() }
    }

    pub fn duplicate_transaction<S: Into<String>>(transaction_id: S) -> Self {
        Self::DuplicateTransaction { transaction_id: transaction_id.into() }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn detector<K, A, B, M>(kind: K, rule_a: A, rule_b: B, message: M) -> Self
    where
        K: Into<String>,
        A: Into<String>,
        B: Into<String>,
        M: Into<String>,
    {
        Self::Detector {
            kind: kind.into(),
            rule_a: rule_a.into(),
            rule_b: rule_b.into(),
            message: message.into(),
        }
    }

    pub fn matcher<R: Into<String>, M: Into<String>>(rule_id: R, message: M) -> Self {
        Self::Match { rule_id: rule_id.into(), message: message.into() }
    }

    pub fn enrichment<E: Into<String>, M: Into<String>>(enricher: E, message: M) -> Self {
        Self::Enrichment { enricher: enricher.into(), message: message.into() }
    }

    /// Returns true if the error only affects one matrix cell, one pair or one
    /// enrichment call and the run can continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Detector { .. } | Self::Match { .. } | Self::Enrichment { .. })
    }
}
