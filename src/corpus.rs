//! Traffic corpus: normalized transactions with one searchable text per request.

use crate::error::{Result, RulemeshError};
use crate::ruleset::opt_string_or_number;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A historical request as supplied by the caller.
///
/// `request_uri` is mandatory; it is optional here only so a missing value can be
/// reported with the record's position instead of as a generic parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default, deserialize_with = "opt_string_or_number", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_data: Option<String>,
}

impl TransactionRecord {
    pub fn new(request_uri: impl Into<String>) -> Self {
        Self { request_uri: Some(request_uri.into()), ..Self::default() }
    }

    #[must_use]
    pub fn with_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn with_matched_data(mut self, matched_data: impl Into<String>) -> Self {
        self.matched_data = Some(matched_data.into());
        self
    }

    /// URI, user agent and matched data joined by a space; absent fields are left out.
    pub fn combined_text(&self) -> String {
        [&self.request_uri, &self.user_agent, &self.matched_data]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_id: String,
    pub text: String,
}

/// Normalized traffic sample. Transactions are addressed by their input position.
#[derive(Debug, Default)]
pub struct TrafficCorpus {
    transactions: Vec<Transaction>,
}

impl TrafficCorpus {
    /// Records without an id get their position as id. If a caller already uses
    /// that value, a `-N` suffix is appended until it is free.
    pub fn from_records(records: &[TransactionRecord]) -> Result<Self> {
        let mut taken: FxHashSet<&str> = FxHashSet::default();
        for (i, record) in records.iter().enumerate() {
            if record.request_uri.is_none() {
                return Err(RulemeshError::missing_field(i, "request_uri"));
            }
            if let Some(id) = record.transaction_id.as_deref() {
                if !taken.insert(id) {
                    return Err(RulemeshError::duplicate_transaction(id));
                }
            }
        }

        let mut generated: FxHashSet<String> = FxHashSet::default();
        let transactions = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let transaction_id = match &record.transaction_id {
                    Some(id) => id.clone(),
                    None => {
                        let id = free_id(i, |candidate| {
                            taken.contains(candidate) || generated.contains(candidate)
                        });
                        generated.insert(id.clone());
                        id
                    }
                };
                Transaction { transaction_id, text: record.combined_text() }
            })
            .collect();

        Ok(Self { transactions })
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn text(&self, idx: usize) -> &str {
        &self.transactions[idx].text
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.transactions[idx].transaction_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }
}

fn free_id(position: usize, in_use: impl Fn(&str) -> bool) -> String {
    let base = position.to_string();
    if !in_use(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !in_use(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_text_skips_missing_fields() {
        let full = TransactionRecord::new("/login?u=admin")
            .with_user_agent("curl/8.0")
            .with_matched_data("admin");
        assert_eq!(full.combined_text(), "/login?u=admin curl/8.0 admin");

        let partial = TransactionRecord::new("/index").with_matched_data("x");
        assert_eq!(partial.combined_text(), "/index x");
    }

    #[test]
    fn test_sequential_ids_assigned() {
        let corpus = TrafficCorpus::from_records(&[
            TransactionRecord::new("/a"),
            TransactionRecord::new("/b"),
        ])
        .unwrap();
        assert_eq!(corpus.id(0), "0");
        assert_eq!(corpus.id(1), "1");
    }

    #[test]
    fn test_explicit_ids_kept() {
        let corpus = TrafficCorpus::from_records(&[TransactionRecord::new("/a").with_id("tx-9")]).unwrap();
        assert_eq!(corpus.id(0), "tx-9");
        assert_eq!(corpus.text(0), "/a");
    }

    #[test]
    fn test_missing_request_uri_is_fatal() {
        let records = vec![
            TransactionRecord::new("/a"),
            TransactionRecord { user_agent: Some("bot".to_string()), ..Default::default() },
        ];
        let err = TrafficCorpus::from_records(&records).unwrap_err();
        assert!(matches!(err, RulemeshError::MissingField { index: 1, field: "request_uri" }));
    }

    #[test]
    fn test_duplicate_transaction_id_rejected() {
        let records = vec![
            TransactionRecord::new("/a").with_id("tx-1"),
            TransactionRecord::new("/b"),
            TransactionRecord::new("/c").with_id("tx-1"),
        ];
        let err = TrafficCorpus::from_records(&records).unwrap_err();
        assert!(matches!(err, RulemeshError::DuplicateTransaction { ref transaction_id } if transaction_id == "tx-1"));
    }

    #[test]
    fn test_generated_ids_avoid_caller_ids() {
        let records = vec![
            TransactionRecord::new("/a").with_id("1"),
            TransactionRecord::new("/b"),
            TransactionRecord::new("/c").with_id("1-1"),
            TransactionRecord::new("/d"),
        ];
        let corpus = TrafficCorpus::from_records(&records).unwrap();
        let ids: Vec<&str> = (0..corpus.len()).map(|i| corpus.id(i)).collect();
        assert_eq!(ids, vec!["1", "1-2", "1-1", "3"]);
    }

    #[test]
    fn test_generated_id_taken_later_in_input() {
        let records = vec![TransactionRecord::new("/a"), TransactionRecord::new("/b").with_id("0")];
        let corpus = TrafficCorpus::from_records(&records).unwrap();
        assert_eq!(corpus.id(0), "0-1");
        assert_eq!(corpus.id(1), "0");
    }

    #[test]
    fn test_numeric_transaction_id_deserializes() {
        let json = r#"[{"transaction_id": 17, "request_uri": "/x"}, {"request_uri": "/y"}]"#;
        let records: Vec<TransactionRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].transaction_id.as_deref(), Some("17"));
        assert!(records[1].transaction_id.is_none());
    }
}
