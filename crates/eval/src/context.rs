//! Evaluation context: the data an expression can see.

use std::collections::BTreeMap;

use crate::types::{Transaction, Value};

/// User-defined variables, already evaluated.
pub type Variables = BTreeMap<String, Value>;

static NO_VARIABLES: Variables = BTreeMap::new();

/// Months assumed when the caller has no period information.
pub const DEFAULT_NUM_MONTHS: u32 = 12;

/// Read-only view over a merchant's transactions plus any user variables.
///
/// User variables shadow the builtin primitives of the same name.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    transactions: &'a [Transaction],
    num_months: u32,
    variables: &'a Variables,
}

impl<'a> EvalContext<'a> {
    pub fn new(transactions: &'a [Transaction], num_months: u32) -> Self {
        EvalContext {
            transactions,
            num_months,
            variables: &NO_VARIABLES,
        }
    }

    /// A context with no transactions, for constant expressions.
    pub fn empty() -> EvalContext<'static> {
        EvalContext {
            transactions: &[],
            num_months: DEFAULT_NUM_MONTHS,
            variables: &NO_VARIABLES,
        }
    }

    pub fn with_variables(self, variables: &'a Variables) -> Self {
        EvalContext { variables, ..self }
    }

    pub fn transactions(&self) -> &'a [Transaction] {
        self.transactions
    }

    pub fn num_months(&self) -> u32 {
        self.num_months
    }

    pub fn variable(&self, name: &str) -> Option<&'a Value> {
        self.variables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn context_carries_period_and_variables() {
        let txns = vec![Transaction::new("M", 1.0, date!(2024 - 01 - 01))];
        let mut vars = Variables::new();
        vars.insert("limit".into(), Value::Number(5.0));
        let ctx = EvalContext::new(&txns, 6).with_variables(&vars);
        assert_eq!(ctx.num_months(), 6);
        assert_eq!(ctx.transactions().len(), 1);
        assert_eq!(ctx.variable("limit"), Some(&Value::Number(5.0)));
        assert_eq!(ctx.variable("missing"), None);

        let empty = EvalContext::empty();
        assert_eq!(empty.num_months(), DEFAULT_NUM_MONTHS);
        assert!(empty.transactions().is_empty());
    }
}
