//! Sections: named, overlapping views over merchants.
//!
//! ```text
//! threshold = 1000
//!
//! [Big Purchases]
//! description: one-off spending above the threshold
//! filter: sum(payments) > threshold and months <= 3
//! ```
//!
//! Top-level `name = expr` lines are globals. Each `[Section]` block may
//! declare its own variables and must have exactly one `filter:`.
//! Expressions are parsed at load time and evaluated per merchant.

use tally_core::{Expr, ParseError};

use crate::context::{EvalContext, Variables};
use crate::expr::eval_expr;
use crate::stats::MerchantGroup;
use crate::types::{EvalError, Transaction, Value};

// ──────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────

/// `name = expression`, parsed but not evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub text: String,
    pub expr: Expr,
    /// Source line; 0 when built in code.
    pub line: usize,
}

impl VariableDecl {
    pub fn new(name: &str, text: &str) -> Result<Self, ParseError> {
        Ok(VariableDecl {
            name: name.to_string(),
            text: text.to_string(),
            expr: tally_core::parse(text)?,
            line: 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub description: Option<String>,
    pub filter_text: String,
    pub filter: Expr,
    pub variables: Vec<VariableDecl>,
    /// Line of the `[Section]` header; 0 when built in code.
    pub line: usize,
}

impl Section {
    pub fn new(name: &str, filter: &str) -> Result<Self, ParseError> {
        Ok(Section {
            name: name.to_string(),
            description: None,
            filter_text: filter.to_string(),
            filter: tally_core::parse(filter)?,
            variables: Vec::new(),
            line: 0,
        })
    }

    pub fn with_variable(mut self, name: &str, text: &str) -> Result<Self, ParseError> {
        declare(&mut self.variables, VariableDecl::new(name, text)?);
        Ok(self)
    }

    /// Evaluate locals on top of `globals`, then the filter.
    pub fn evaluate_filter(
        &self,
        transactions: &[Transaction],
        num_months: u32,
        globals: &Variables,
    ) -> Result<bool, EvalError> {
        let variables = evaluate_variables(&self.variables, transactions, num_months, globals.clone());
        let ctx = EvalContext::new(transactions, num_months).with_variables(&variables);
        Ok(eval_expr(&self.filter, &ctx)?.truthy())
    }

    /// Like [`Section::evaluate_filter`], but any evaluation error is a
    /// non-match.
    pub fn matches(&self, transactions: &[Transaction], num_months: u32, globals: &Variables) -> bool {
        match self.evaluate_filter(transactions, num_months, globals) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::debug!(section = %self.name, error = %e, "filter failed; treating as no match");
                false
            }
        }
    }
}

/// A parsed section file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionConfig {
    pub global_variables: Vec<VariableDecl>,
    pub sections: Vec<Section>,
}

impl SectionConfig {
    pub fn parse(text: &str) -> Result<Self, SectionParseError> {
        parse_sections(text)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Globals evaluated against one merchant's transactions.
    pub fn global_values(&self, transactions: &[Transaction], num_months: u32) -> Variables {
        evaluate_variables(&self.global_variables, transactions, num_months, Variables::new())
    }

    /// Assign each merchant to every section whose filter it passes.
    ///
    /// Filters see each transaction under the merchant's own category and
    /// subcategory, so `category` agrees with the rule engine even when
    /// the merchant was recategorized partway through the data.
    pub fn classify<'m>(&self, merchants: &'m [MerchantGroup], num_months: u32) -> SectionResults<'m> {
        let mut entries: Vec<SectionMatch<'m>> = self
            .sections
            .iter()
            .map(|s| SectionMatch {
                name: s.name.clone(),
                merchants: Vec::new(),
            })
            .collect();

        for merchant in merchants {
            let transactions = merchant.recategorized_transactions();
            let globals = self.global_values(&transactions, num_months);
            for (section, entry) in self.sections.iter().zip(entries.iter_mut()) {
                if section.matches(&transactions, num_months, &globals) {
                    entry.merchants.push(merchant);
                }
            }
        }
        SectionResults { entries }
    }
}

/// Evaluate declarations in order on top of `seed`. Each sees the ones
/// before it; a failing declaration is bound to `None`.
pub fn evaluate_variables(
    decls: &[VariableDecl],
    transactions: &[Transaction],
    num_months: u32,
    seed: Variables,
) -> Variables {
    let mut values = seed;
    for decl in decls {
        let ctx = EvalContext::new(transactions, num_months).with_variables(&values);
        let value = match eval_expr(&decl.expr, &ctx) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(variable = %decl.name, error = %e, "variable failed; binding None");
                Value::Null
            }
        };
        values.insert(decl.name.clone(), value);
    }
    values
}

/// Replace an existing declaration of the same name in place, else append.
fn declare(decls: &mut Vec<VariableDecl>, decl: VariableDecl) {
    match decls.iter_mut().find(|d| d.name == decl.name) {
        Some(slot) => *slot = decl,
        None => decls.push(decl),
    }
}

// ──────────────────────────────────────────────
// Results
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SectionMatch<'m> {
    pub name: String,
    pub merchants: Vec<&'m MerchantGroup>,
}

/// Merchants per section, in section order. Every section has an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionResults<'m> {
    entries: Vec<SectionMatch<'m>>,
}

impl<'m> SectionResults<'m> {
    pub fn get(&self, name: &str) -> Option<&[&'m MerchantGroup]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.merchants.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionMatch<'m>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        let sections: Vec<serde_json::Value> = self
            .entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.name,
                    "merchants": e.merchants.iter().map(|m| m.merchant.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::Value::Array(sections)
    }
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct SectionParseError {
    pub line: usize,
    pub text: String,
    pub message: String,
}

impl SectionParseError {
    fn new(line: usize, text: &str, message: impl Into<String>) -> Self {
        SectionParseError {
            line,
            text: text.to_string(),
            message: message.into(),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": "section",
            "line": self.line,
            "text": self.text,
            "message": self.message,
        })
    }
}

struct PendingSection {
    name: String,
    line: usize,
    header: String,
    description: Option<String>,
    filter: Option<(String, Expr)>,
    variables: Vec<VariableDecl>,
}

impl PendingSection {
    fn finish(self) -> Result<Section, SectionParseError> {
        let Some((filter_text, filter)) = self.filter else {
            return Err(SectionParseError::new(
                self.line,
                &self.header,
                format!("section [{}] has no filter", self.name),
            ));
        };
        Ok(Section {
            name: self.name,
            description: self.description,
            filter_text,
            filter,
            variables: self.variables,
            line: self.line,
        })
    }
}

pub fn parse_sections(text: &str) -> Result<SectionConfig, SectionParseError> {
    let mut config = SectionConfig::default();
    let mut current: Option<PendingSection> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |message: String| SectionParseError::new(line_no, line, message);

        if let Some(caps) = regex!(r"^\[([^\]]+)\]$").captures(line) {
            let name = caps[1].trim().to_string();
            if let Some(done) = current.take() {
                config.sections.push(done.finish()?);
            }
            if config.section(&name).is_some() {
                return Err(err(format!("duplicate section [{}]", name)));
            }
            current = Some(PendingSection {
                name,
                line: line_no,
                header: line.to_string(),
                description: None,
                filter: None,
                variables: Vec::new(),
            });
            continue;
        }

        if let Some(caps) = regex!(r"^filter:\s*(.*)$").captures(line) {
            let section = current
                .as_mut()
                .ok_or_else(|| err("filter: found outside of a section".into()))?;
            if section.filter.is_some() {
                return Err(err(format!("section [{}] has more than one filter", section.name)));
            }
            let filter_text = caps[1].trim();
            let expr = tally_core::parse(filter_text)
                .map_err(|e| err(format!("invalid filter expression: {}", e)))?;
            section.filter = Some((filter_text.to_string(), expr));
            continue;
        }

        if let Some(caps) = regex!(r"^description:\s*(.*)$").captures(line) {
            let section = current
                .as_mut()
                .ok_or_else(|| err("description: found outside of a section".into()))?;
            section.description = Some(caps[1].trim().to_string());
            continue;
        }

        if let Some(caps) = regex!(r"^(\w+)\s*=\s*(.+)$").captures(line) {
            let name = &caps[1];
            let expr_text = caps[2].trim();
            let expr = tally_core::parse(expr_text)
                .map_err(|e| err(format!("invalid expression for variable '{}': {}", name, e)))?;
            let decl = VariableDecl {
                name: name.to_string(),
                text: expr_text.to_string(),
                expr,
                line: line_no,
            };
            match current.as_mut() {
                Some(section) => declare(&mut section.variables, decl),
                None => declare(&mut config.global_variables, decl),
            }
            continue;
        }

        return Err(err(format!("unexpected content: {}", line)));
    }

    if let Some(done) = current.take() {
        config.sections.push(done.finish()?);
    }
    tracing::debug!(
        sections = config.sections.len(),
        globals = config.global_variables.len(),
        "loaded section config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn txn(amount: f64, category: &str) -> Transaction {
        Transaction::new("M", amount, date!(2024 - 01 - 15)).categorized(category, "")
    }

    #[test]
    fn parses_globals_sections_and_locals() {
        let config = SectionConfig::parse(
            "threshold = 500\n\n[Big]\ndescription: large spend\nbig = sum(payments) > threshold\nfilter: big\n\n[All]\nfilter: True\n",
        )
        .unwrap();
        assert_eq!(config.global_variables.len(), 1);
        assert_eq!(config.global_variables[0].line, 1);
        assert_eq!(config.section_names().collect::<Vec<_>>(), ["Big", "All"]);
        let big = config.section("Big").unwrap();
        assert_eq!(big.description.as_deref(), Some("large spend"));
        assert_eq!(big.variables[0].name, "big");
        assert_eq!(big.filter_text, "big");
        assert_eq!(big.line, 3);
    }

    #[test]
    fn structural_errors() {
        let e = SectionConfig::parse("filter: True").unwrap_err();
        assert_eq!(e.line, 1);
        assert!(e.message.contains("outside of a section"));

        let e = SectionConfig::parse("[A]\nx = 1\n\n[B]\nfilter: True").unwrap_err();
        assert_eq!(e.line, 1);
        assert!(e.message.contains("[A] has no filter"));

        let e = SectionConfig::parse("[A]\nfilter: True\nfilter: False").unwrap_err();
        assert_eq!(e.line, 3);

        let e = SectionConfig::parse("[A]\nfilter: True\n[A]\nfilter: True").unwrap_err();
        assert!(e.message.contains("duplicate section"));

        let e = SectionConfig::parse("[A]\nfilter: True\nwhat is this").unwrap_err();
        assert!(e.message.contains("unexpected content"));
        assert_eq!(e.text, "what is this");
    }

    #[test]
    fn expression_errors_carry_line() {
        let e = SectionConfig::parse("[A]\nfilter: [1, 2]").unwrap_err();
        assert_eq!(e.line, 2);
        assert!(e.message.starts_with("invalid filter expression"));

        let e = SectionConfig::parse("x = (1 +").unwrap_err();
        assert!(e.message.contains("variable 'x'"));
        assert_eq!(e.to_json_value()["kind"], "section");
    }

    #[test]
    fn redeclaration_replaces_in_place() {
        let config = SectionConfig::parse("a = 1\nb = 2\na = 3\n").unwrap();
        let names: Vec<_> = config.global_variables.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(config.global_variables[0].text, "3");
    }

    #[test]
    fn failing_variable_binds_none() {
        let decls = vec![
            VariableDecl::new("bad", "nope + 1").unwrap(),
            VariableDecl::new("good", "2 * 3").unwrap(),
        ];
        let vars = evaluate_variables(&decls, &[], 12, Variables::new());
        assert_eq!(vars["bad"], Value::Null);
        assert_eq!(vars["good"], Value::Number(6.0));
    }

    #[test]
    fn chained_variables_see_earlier_ones() {
        let decls = vec![
            VariableDecl::new("total", "sum(payments)").unwrap(),
            VariableDecl::new("half", "total / 2").unwrap(),
        ];
        let txns = vec![txn(40.0, "X"), txn(60.0, "X")];
        let vars = evaluate_variables(&decls, &txns, 12, Variables::new());
        assert_eq!(vars["half"], Value::Number(50.0));
    }

    #[test]
    fn filter_errors_are_no_match() {
        let section = Section::new("Broken", "undefined_thing > 1").unwrap();
        let txns = vec![txn(1.0, "X")];
        assert!(section.evaluate_filter(&txns, 12, &Variables::new()).is_err());
        assert!(!section.matches(&txns, 12, &Variables::new()));
    }

    #[test]
    fn locals_see_globals() {
        let section = Section::new("S", "sum(payments) > limit")
            .unwrap()
            .with_variable("limit", "base * 2")
            .unwrap();
        let mut globals = Variables::new();
        globals.insert("base".into(), Value::Number(40.0));
        assert!(section.matches(&[txn(100.0, "X")], 12, &globals));
        assert!(!section.matches(&[txn(50.0, "X")], 12, &globals));
    }
}
