//! Tally evaluator -- runs the expression language over transaction data
//! and classifies merchants.
//!
//! - [`expr`] evaluates parsed expressions against an [`EvalContext`]
//! - [`rules`] assigns each merchant a [`Bucket`] and [`CalcMethod`]
//! - [`sections`] sorts merchants into overlapping named views
//! - [`modifiers`] splits `[amount>100]`-style conditions off patterns
//! - [`stats`] groups transactions per merchant and computes the figures
//!   the rule engine reads
//!
//! Everything here is pure: no I/O, no shared mutable state. Parsed rule
//! sets and section configs can be reused across any number of merchants.

#[macro_use]
mod macros;

pub mod builtins;
pub mod context;
pub mod defaults;
pub mod expr;
pub mod modifiers;
pub mod numeric;
pub mod rules;
pub mod sections;
pub mod stats;
pub mod types;

pub use context::{EvalContext, Variables};
pub use defaults::{default_rules, default_sections, DEFAULT_RULES, DEFAULT_SECTIONS};
pub use expr::{eval_expr, evaluate, evaluate_filter};
pub use modifiers::{parse_pattern, AmountCondition, DateCondition, ModifierParseError, ParsedPattern};
pub use rules::{Bucket, CalcMethod, CalcType, Classification, RuleParseError, RuleSet};
pub use sections::{Section, SectionConfig, SectionParseError, SectionResults};
pub use stats::{
    group_by_merchant, is_spending, period_months, MerchantGroup, MerchantStats, SectionTotals,
};
pub use types::{Comparison, EvalError, Transaction, Value};

/// Classify every merchant in `transactions` with `rules`, in order of
/// first appearance.
///
/// The data period is derived from the transactions themselves.
pub fn classify_all(transactions: &[Transaction], rules: &RuleSet) -> Vec<(MerchantGroup, Classification)> {
    let num_months = period_months(transactions);
    group_by_merchant(transactions)
        .into_iter()
        .map(|group| {
            let classification = rules.classify(&group.stats(), num_months);
            (group, classification)
        })
        .collect()
}
