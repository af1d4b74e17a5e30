//! Classification rules.
//!
//! A rule file is a list of lines of the form
//!
//! ```text
//! category=Bills,subcategory=Power[months>=50%] -> monthly,auto
//! * -> variable,/12
//! ```
//!
//! Rules are tried in file order and the first rule whose field matches
//! and numeric conditions all hold decides the merchant's bucket and how
//! its monthly figure is computed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stats::MerchantStats;
use crate::types::Comparison;

/// Absolute tolerance for `=` in numeric conditions.
pub const EQ_TOLERANCE: f64 = 0.001;

/// Cut-off between steady and irregular spending for `auto`.
pub const AUTO_CV_THRESHOLD: f64 = 0.3;

// ──────────────────────────────────────────────
// Buckets and calculation methods
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Excluded,
    Travel,
    Annual,
    Periodic,
    Monthly,
    OneOff,
    Variable,
}

impl Bucket {
    pub const ALL: [Bucket; 7] = [
        Bucket::Excluded,
        Bucket::Travel,
        Bucket::Annual,
        Bucket::Periodic,
        Bucket::Monthly,
        Bucket::OneOff,
        Bucket::Variable,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Bucket::ALL.into_iter().find(|b| b.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Excluded => "excluded",
            Bucket::Travel => "travel",
            Bucket::Annual => "annual",
            Bucket::Periodic => "periodic",
            Bucket::Monthly => "monthly",
            Bucket::OneOff => "one_off",
            Bucket::Variable => "variable",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calculation type as written in a rule; `auto` is resolved per merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalcType {
    #[serde(rename = "avg")]
    Avg,
    #[serde(rename = "/12")]
    Annualized,
    #[serde(rename = "auto")]
    Auto,
}

impl CalcType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "avg" => Some(CalcType::Avg),
            "/12" => Some(CalcType::Annualized),
            "auto" => Some(CalcType::Auto),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalcType::Avg => "avg",
            CalcType::Annualized => "/12",
            CalcType::Auto => "auto",
        }
    }

    /// `auto` becomes `avg` for steady spending (cv below 0.3), `/12` otherwise.
    pub fn resolve(self, cv: f64) -> CalcMethod {
        match self {
            CalcType::Avg => CalcMethod::Avg,
            CalcType::Annualized => CalcMethod::Annualized,
            CalcType::Auto if cv < AUTO_CV_THRESHOLD => CalcMethod::Avg,
            CalcType::Auto => CalcMethod::Annualized,
        }
    }
}

/// A resolved calculation method; never `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalcMethod {
    /// Average over the months the merchant was active.
    #[serde(rename = "avg")]
    Avg,
    /// Spread the total evenly over a year.
    #[serde(rename = "/12")]
    Annualized,
}

impl CalcMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CalcMethod::Avg => "avg",
            CalcMethod::Annualized => "/12",
        }
    }

    pub fn monthly_value(self, total: f64, months_active: u32) -> f64 {
        match self {
            CalcMethod::Avg if months_active > 0 => total / months_active as f64,
            CalcMethod::Avg => 0.0,
            CalcMethod::Annualized => total / 12.0,
        }
    }
}

impl fmt::Display for CalcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Rule structure
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Category,
    Subcategory,
}

/// `category=Bills` -- exact, case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub field: MatchField,
    pub value: String,
}

impl FieldMatch {
    fn holds(&self, stats: &MerchantStats) -> bool {
        let actual = match self.field {
            MatchField::Category => &stats.category,
            MatchField::Subcategory => &stats.subcategory,
        };
        *actual == self.value
    }
}

/// Statistic a numeric condition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatVariable {
    Months,
    Count,
    Total,
    Cv,
    Max,
    Avg,
    MaxAvgRatio,
}

impl StatVariable {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "months" => Some(StatVariable::Months),
            "count" => Some(StatVariable::Count),
            "total" => Some(StatVariable::Total),
            "cv" => Some(StatVariable::Cv),
            "max" => Some(StatVariable::Max),
            "avg" => Some(StatVariable::Avg),
            "max_avg_ratio" => Some(StatVariable::MaxAvgRatio),
            _ => None,
        }
    }

    pub fn read(self, stats: &MerchantStats) -> f64 {
        match self {
            StatVariable::Months => stats.months_active as f64,
            StatVariable::Count => stats.count as f64,
            StatVariable::Total => stats.total,
            StatVariable::Cv => stats.cv,
            StatVariable::Max => stats.max_payment,
            StatVariable::Avg => stats.avg(),
            StatVariable::MaxAvgRatio => stats.max_avg_ratio(),
        }
    }
}

/// `[months>=50%]`, `[cv<0.3]`, ...
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericCondition {
    pub variable: StatVariable,
    pub op: Comparison,
    pub value: f64,
    /// The threshold is a share of the data period, not an absolute value.
    pub is_percentage: bool,
}

impl NumericCondition {
    /// Absolute threshold for this period. Percentages become a month count
    /// of at least 2.
    pub fn threshold(&self, num_months: u32) -> f64 {
        if self.is_percentage {
            (num_months as f64 * self.value / 100.0).floor().max(2.0)
        } else {
            self.value
        }
    }

    pub fn holds(&self, stats: &MerchantStats, num_months: u32) -> bool {
        let actual = self.variable.read(stats);
        self.op.holds(actual, self.threshold(num_months), EQ_TOLERANCE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRule {
    pub line_number: usize,
    pub raw_text: String,
    pub field_matches: Vec<FieldMatch>,
    pub conditions: Vec<NumericCondition>,
    pub bucket: Bucket,
    pub calc_type: CalcType,
    /// The `*` wildcard rule.
    pub is_default: bool,
}

impl ClassificationRule {
    pub fn matches(&self, stats: &MerchantStats, num_months: u32) -> bool {
        if self.is_default {
            return true;
        }
        self.field_matches.iter().all(|m| m.holds(stats))
            && self.conditions.iter().all(|c| c.holds(stats, num_months))
    }
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

/// A rule line that could not be parsed. Loading stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}: {text}")]
pub struct RuleParseError {
    pub line: usize,
    pub text: String,
    pub message: String,
}

impl RuleParseError {
    fn new(line: usize, text: &str, message: impl Into<String>) -> Self {
        RuleParseError {
            line,
            text: text.to_string(),
            message: message.into(),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": "rule",
            "line": self.line,
            "text": self.text,
            "message": self.message,
        })
    }
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_rule(line: &str, line_number: usize) -> Result<Option<ClassificationRule>, RuleParseError> {
    let text = line.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let err = |message: String| RuleParseError::new(line_number, text, message);

    let caps = regex!(r"^(.+?)\s*->\s*([\w/]+)\s*,\s*([\w/]+)$")
        .captures(text)
        .ok_or_else(|| err("invalid rule syntax (expected 'conditions -> bucket,calc_type')".into()))?;
    let conditions_part = caps[1].trim();

    let bucket = Bucket::from_name(&caps[2]).ok_or_else(|| {
        err(format!(
            "invalid bucket '{}' (expected one of: {})",
            &caps[2],
            Bucket::ALL.map(Bucket::as_str).join(", ")
        ))
    })?;
    let calc_type = CalcType::from_name(&caps[3]).ok_or_else(|| {
        err(format!(
            "invalid calc_type '{}' (expected one of: avg, /12, auto)",
            &caps[3]
        ))
    })?;

    let mut rule = ClassificationRule {
        line_number,
        raw_text: text.to_string(),
        field_matches: Vec::new(),
        conditions: Vec::new(),
        bucket,
        calc_type,
        is_default: conditions_part == "*",
    };
    if rule.is_default {
        return Ok(Some(rule));
    }

    for group in regex!(r"\[([^\[\]]*)\]").captures_iter(conditions_part) {
        let body = group[1].trim();
        let m = regex!(r"^(\w+)\s*(>=|<=|>|<|=)\s*(\d+(?:\.\d+)?|\.\d+)\s*(%?)$")
            .captures(body)
            .ok_or_else(|| err(format!("invalid modifier '[{}]'", body)))?;
        let variable = StatVariable::from_name(&m[1]).ok_or_else(|| {
            err(format!(
                "invalid variable '{}' (expected one of: months, count, total, cv, max, avg, max_avg_ratio)",
                &m[1]
            ))
        })?;
        let op = Comparison::from_symbol(&m[2])
            .ok_or_else(|| err(format!("invalid operator '{}'", &m[2])))?;
        let value: f64 = m[3]
            .parse()
            .map_err(|_| err(format!("invalid number '{}'", &m[3])))?;
        rule.conditions.push(NumericCondition {
            variable,
            op,
            value,
            is_percentage: !m[4].is_empty(),
        });
    }

    let fields_part = regex!(r"\[[^\[\]]*\]").replace_all(conditions_part, "");
    let fields_part = fields_part.trim();
    if !fields_part.is_empty() {
        for item in fields_part.split(',') {
            let m = regex!(r"^\s*(\w+)\s*=\s*([^,\[\]]*?)\s*$")
                .captures(item)
                .filter(|m| !m[2].is_empty())
                .ok_or_else(|| err(format!("invalid condition '{}'", item.trim())))?;
            let field = match &m[1] {
                "category" => MatchField::Category,
                "subcategory" => MatchField::Subcategory,
                other => {
                    return Err(err(format!(
                        "invalid field '{}' (expected 'category' or 'subcategory')",
                        other
                    )))
                }
            };
            rule.field_matches.push(FieldMatch {
                field,
                value: m[2].to_string(),
            });
        }
    }

    if rule.field_matches.is_empty() && rule.conditions.is_empty() {
        return Err(err("rule has no conditions (use '*' for a default rule)".into()));
    }
    Ok(Some(rule))
}

// ──────────────────────────────────────────────
// Rule sets
// ──────────────────────────────────────────────

/// Outcome of classifying one merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub bucket: Bucket,
    pub calc_type: CalcMethod,
    /// Line of the rule that matched; `None` for the built-in fallback.
    pub rule_line: Option<usize>,
}

impl Classification {
    /// Used when no rule matches at all.
    pub const FALLBACK: Classification = Classification {
        bucket: Bucket::Variable,
        calc_type: CalcMethod::Annualized,
        rule_line: None,
    };
}

/// An ordered, immutable list of rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    pub fn parse(text: &str) -> Result<Self, RuleParseError> {
        let mut rules = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if let Some(rule) = parse_rule(line, idx + 1)? {
                rules.push(rule);
            }
        }
        tracing::debug!(rules = rules.len(), "loaded classification rules");
        Ok(RuleSet { rules })
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn has_default(&self) -> bool {
        self.rules.iter().any(|r| r.is_default)
    }

    /// First matching rule, if any.
    pub fn find_match(&self, stats: &MerchantStats, num_months: u32) -> Option<&ClassificationRule> {
        self.rules.iter().find(|r| r.matches(stats, num_months))
    }

    /// Bucket and resolved calculation method for a merchant.
    pub fn classify(&self, stats: &MerchantStats, num_months: u32) -> Classification {
        match self.find_match(stats, num_months) {
            Some(rule) => Classification {
                bucket: rule.bucket,
                calc_type: rule.calc_type.resolve(stats.cv),
                rule_line: Some(rule.line_number),
            },
            None => {
                tracing::warn!(
                    category = %stats.category,
                    subcategory = %stats.subcategory,
                    "no classification rule matched; falling back to variable,/12"
                );
                Classification::FALLBACK
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(category: &str, months_active: u32, cv: f64) -> MerchantStats {
        MerchantStats {
            category: category.into(),
            subcategory: String::new(),
            months_active,
            count: months_active,
            total: 100.0 * months_active as f64,
            cv,
            max_payment: 100.0,
        }
    }

    fn rule(line: &str) -> ClassificationRule {
        parse_rule(line, 1).unwrap().unwrap()
    }

    #[test]
    fn parses_field_matches_and_modifiers() {
        let r = rule("category=Bills,subcategory=Power[months>=50%][cv<0.3] -> monthly,auto");
        assert_eq!(r.bucket, Bucket::Monthly);
        assert_eq!(r.calc_type, CalcType::Auto);
        assert_eq!(r.field_matches.len(), 2);
        assert_eq!(r.field_matches[1].value, "Power");
        assert_eq!(r.conditions.len(), 2);
        assert!(r.conditions[0].is_percentage);
        assert_eq!(r.conditions[1].op, Comparison::Lt);
    }

    #[test]
    fn wildcard_and_comments() {
        assert!(rule("* -> variable,/12").is_default);
        assert!(parse_rule("   # note", 3).unwrap().is_none());
        assert!(parse_rule("", 4).unwrap().is_none());
    }

    #[test]
    fn modifier_only_rule() {
        let r = rule("[max_avg_ratio>3] -> one_off,/12");
        assert!(r.field_matches.is_empty());
        assert_eq!(r.conditions[0].variable, StatVariable::MaxAvgRatio);
    }

    #[test]
    fn rejects_bad_names() {
        let e = parse_rule("category=X -> bogus,avg", 7).unwrap_err();
        assert_eq!(e.line, 7);
        assert!(e.message.contains("invalid bucket 'bogus'"));

        let e = parse_rule("category=X -> monthly,weekly", 2).unwrap_err();
        assert!(e.message.contains("invalid calc_type"));

        let e = parse_rule("merchant=X -> monthly,avg", 2).unwrap_err();
        assert!(e.message.contains("invalid field 'merchant'"));

        let e = parse_rule("category=X[speed>3] -> monthly,avg", 2).unwrap_err();
        assert!(e.message.contains("invalid variable 'speed'"));
    }

    #[test]
    fn rejects_malformed_syntax() {
        assert!(parse_rule("category=X monthly,avg", 1).is_err());
        assert!(parse_rule("category=X[months>>3] -> monthly,avg", 1).is_err());
        assert!(parse_rule("category -> monthly,avg", 1).is_err());
        assert!(parse_rule("category=X] -> monthly,avg", 1).is_err());
    }

    #[test]
    fn error_names_line_and_text() {
        let e = parse_rule("oops", 12).unwrap_err();
        let msg = e.to_string();
        assert!(msg.starts_with("line 12: "));
        assert!(msg.ends_with(": oops"));
        assert_eq!(e.to_json_value()["line"], 12);
    }

    #[test]
    fn percentage_threshold_has_floor_of_two() {
        let c = rule("[months>=50%] -> monthly,avg").conditions[0];
        assert_eq!(c.threshold(12), 6.0);
        assert_eq!(c.threshold(3), 2.0);
        assert_eq!(c.threshold(1), 2.0);
    }

    #[test]
    fn equality_has_tolerance() {
        let r = rule("[cv=0.5] -> variable,avg");
        assert!(r.matches(&stats("X", 1, 0.5004), 12));
        assert!(!r.matches(&stats("X", 1, 0.502), 12));
    }

    #[test]
    fn field_match_is_case_sensitive() {
        let r = rule("category=Bills -> monthly,avg");
        assert!(r.matches(&stats("Bills", 1, 0.0), 12));
        assert!(!r.matches(&stats("bills", 1, 0.0), 12));
    }

    #[test]
    fn auto_resolves_on_cv() {
        let set = RuleSet::parse("category=Bills[months>=50%] -> monthly,auto\n* -> variable,/12").unwrap();
        let c = set.classify(&stats("Bills", 7, 0.1), 12);
        assert_eq!((c.bucket, c.calc_type), (Bucket::Monthly, CalcMethod::Avg));
        assert_eq!(c.rule_line, Some(1));

        let c = set.classify(&stats("Bills", 7, 0.5), 12);
        assert_eq!(c.calc_type, CalcMethod::Annualized);

        let c = set.classify(&stats("Bills", 5, 0.1), 12);
        assert_eq!(c.bucket, Bucket::Variable);
        assert_eq!(c.rule_line, Some(2));
    }

    #[test]
    fn first_match_wins() {
        let set = RuleSet::parse("category=Food -> variable,avg\ncategory=Food -> monthly,avg").unwrap();
        assert_eq!(set.classify(&stats("Food", 3, 0.0), 12).bucket, Bucket::Variable);
    }

    #[test]
    fn no_match_falls_back() {
        let set = RuleSet::parse("category=Food -> monthly,avg").unwrap();
        assert!(!set.has_default());
        assert_eq!(set.classify(&stats("Travel", 3, 0.0), 12), Classification::FALLBACK);
    }

    #[test]
    fn line_numbers_count_physical_lines() {
        let set = RuleSet::parse("# header\n\ncategory=A -> monthly,avg\n").unwrap();
        assert_eq!(set.rules()[0].line_number, 3);
        let e = RuleSet::parse("# header\n\n\nnope -> x,y").unwrap_err();
        assert_eq!(e.line, 4);
    }

    #[test]
    fn serializes_with_file_spellings() {
        let c = Classification {
            bucket: Bucket::OneOff,
            calc_type: CalcMethod::Annualized,
            rule_line: Some(4),
        };
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["bucket"], "one_off");
        assert_eq!(json["calc_type"], "/12");
    }

    #[test]
    fn monthly_value() {
        assert_eq!(CalcMethod::Avg.monthly_value(300.0, 3), 100.0);
        assert_eq!(CalcMethod::Avg.monthly_value(300.0, 0), 0.0);
        assert_eq!(CalcMethod::Annualized.monthly_value(1200.0, 3), 100.0);
    }
}
