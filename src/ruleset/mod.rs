//! Rule normalization and the compiled-rule arena.
//!
//! # Structure
//! - `record`: serde input records as supplied by callers
//! - `compile`: pattern compilation with the escaped-literal fallback
//! - `set`: the normalized `Rule` and the immutable `RuleSet` arena

mod compile;
mod record;
mod set;

pub use compile::{compile_pattern, flags_case_insensitive, CompileStatus};
pub use record::RuleRecord;
pub(crate) use record::opt_string_or_number;
pub use set::{is_blocking_action, Rule, RuleSet, RuleSummary};
