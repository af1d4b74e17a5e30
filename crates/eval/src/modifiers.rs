//! Inline amount/date modifiers on merchant patterns.
//!
//! A pattern may end with bracketed conditions:
//!
//! ```text
//! COSTCO(?!GAS)[amount>200][date:2025-01-01..2025-06-30]
//! ```
//!
//! Only trailing groups that start with `amount`, `date` or `month`
//! followed by an operator are modifiers. Any other bracket group (a regex
//! character class, say) stays in the pattern.

use std::fmt;

use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::types::Comparison;

/// Amount equality absorbs half a cent of floating-point noise.
pub const AMOUNT_EPSILON: f64 = 0.005;

// ──────────────────────────────────────────────
// Conditions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmountCondition {
    /// `[amount>200]`, `[amount=499.99]`, ...
    Compare { op: Comparison, value: f64 },
    /// `[amount:20-100]`, inclusive.
    Range { min: f64, max: f64 },
}

impl AmountCondition {
    pub fn operator(&self) -> &'static str {
        match self {
            AmountCondition::Compare { op, .. } => op.symbol(),
            AmountCondition::Range { .. } => ":",
        }
    }

    pub fn holds(&self, amount: f64) -> bool {
        match *self {
            AmountCondition::Compare { op, value } => op.holds(amount, value, AMOUNT_EPSILON),
            AmountCondition::Range { min, max } => min <= amount && amount <= max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCondition {
    /// `[date=2025-01-15]`
    On(Date),
    /// `[date:2025-01-01..2025-06-30]`, inclusive.
    Range { start: Date, end: Date },
    /// `[date:last30days]`: from `today - n` through today.
    LastDays(u32),
    /// `[month=12]`, any year.
    Month(u8),
}

impl DateCondition {
    pub fn operator(&self) -> &'static str {
        match self {
            DateCondition::On(_) => "=",
            DateCondition::Range { .. } => ":",
            DateCondition::LastDays(_) => "relative",
            DateCondition::Month(_) => "month",
        }
    }

    pub fn holds_on(&self, date: Date, today: Date) -> bool {
        match *self {
            DateCondition::On(day) => date == day,
            DateCondition::Range { start, end } => start <= date && date <= end,
            DateCondition::LastDays(days) => {
                let start = today
                    .checked_sub(Duration::days(i64::from(days)))
                    .unwrap_or(Date::MIN);
                start <= date && date <= today
            }
            DateCondition::Month(month) => date.month() as u8 == month,
        }
    }
}

/// A merchant pattern with its modifiers split off.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPattern {
    pub pattern: String,
    pub amount_conditions: Vec<AmountCondition>,
    pub date_conditions: Vec<DateCondition>,
}

impl ParsedPattern {
    pub fn has_conditions(&self) -> bool {
        !self.amount_conditions.is_empty() || !self.date_conditions.is_empty()
    }

    /// Check every condition, with "today" taken from the UTC clock.
    pub fn check_all_conditions(&self, amount: Option<f64>, date: Option<Date>) -> bool {
        self.check_all_conditions_on(amount, date, OffsetDateTime::now_utc().date())
    }

    /// Check every condition against a fixed reference day. A condition
    /// whose input is absent fails.
    pub fn check_all_conditions_on(&self, amount: Option<f64>, date: Option<Date>, today: Date) -> bool {
        let amounts_ok = self
            .amount_conditions
            .iter()
            .all(|c| amount.is_some_and(|a| c.holds(a)));
        let dates_ok = self
            .date_conditions
            .iter()
            .all(|c| date.is_some_and(|d| c.holds_on(d, today)));
        amounts_ok && dates_ok
    }
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid modifier '[{modifier}]': {message}")]
pub struct ModifierParseError {
    pub modifier: String,
    pub message: String,
}

impl ModifierParseError {
    fn new(modifier: &str, message: impl Into<String>) -> Self {
        ModifierParseError {
            modifier: modifier.to_string(),
            message: message.into(),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": "modifier",
            "modifier": self.modifier,
            "message": self.message,
        })
    }
}

enum Modifier {
    Amount(AmountCondition),
    Date(DateCondition),
}

/// Split trailing modifiers off `text`.
pub fn parse_pattern(text: &str) -> Result<ParsedPattern, ModifierParseError> {
    let mut rest = text.trim_end();
    let mut bodies: Vec<&str> = Vec::new();
    while rest.ends_with(']') {
        let Some(open) = rest.rfind('[') else {
            break;
        };
        let body = &rest[open + 1..rest.len() - 1];
        if !regex!(r"^\s*(amount|date|month)\s*[<>=:]").is_match(body) {
            break;
        }
        bodies.push(body);
        rest = &rest[..open];
    }

    let mut parsed = ParsedPattern {
        pattern: rest.trim_end().to_string(),
        amount_conditions: Vec::new(),
        date_conditions: Vec::new(),
    };
    for body in bodies.into_iter().rev() {
        match parse_modifier(body.trim())? {
            Modifier::Amount(c) => parsed.amount_conditions.push(c),
            Modifier::Date(c) => parsed.date_conditions.push(c),
        }
    }
    Ok(parsed)
}

fn parse_modifier(body: &str) -> Result<Modifier, ModifierParseError> {
    let err = |message: &str| ModifierParseError::new(body, message);

    if body.starts_with("amount") {
        if let Some(m) = regex!(r"^amount\s*(>=|<=|>|<|=)\s*(-?\d+(?:\.\d+)?)$").captures(body) {
            let op = Comparison::from_symbol(&m[1]).ok_or_else(|| err("unknown operator"))?;
            let value = parse_number(&m[2]).ok_or_else(|| err("invalid number"))?;
            return Ok(Modifier::Amount(AmountCondition::Compare { op, value }));
        }
        if let Some(m) =
            regex!(r"^amount\s*:\s*(-?\d+(?:\.\d+)?)\s*-\s*(-?\d+(?:\.\d+)?)$").captures(body)
        {
            let min = parse_number(&m[1]).ok_or_else(|| err("invalid number"))?;
            let max = parse_number(&m[2]).ok_or_else(|| err("invalid number"))?;
            if min > max {
                return Err(err("range minimum exceeds maximum"));
            }
            return Ok(Modifier::Amount(AmountCondition::Range { min, max }));
        }
        return Err(err("expected amount OP N or amount:MIN-MAX"));
    }

    if body.starts_with("date") {
        if let Some(m) = regex!(r"^date\s*=\s*(\S+)$").captures(body) {
            let day = parse_date(&m[1]).ok_or_else(|| err("expected a date as YYYY-MM-DD"))?;
            return Ok(Modifier::Date(DateCondition::On(day)));
        }
        if let Some(m) = regex!(r"^date\s*:\s*last(\d+)days$").captures(body) {
            let days: u32 = m[1].parse().map_err(|_| err("day count out of range"))?;
            return Ok(Modifier::Date(DateCondition::LastDays(days)));
        }
        if let Some(m) = regex!(r"^date\s*:\s*(\S+?)\s*\.\.\s*(\S+)$").captures(body) {
            let start = parse_date(&m[1]).ok_or_else(|| err("expected a date as YYYY-MM-DD"))?;
            let end = parse_date(&m[2]).ok_or_else(|| err("expected a date as YYYY-MM-DD"))?;
            if start > end {
                return Err(err("range start is after its end"));
            }
            return Ok(Modifier::Date(DateCondition::Range { start, end }));
        }
        return Err(err("expected date=YYYY-MM-DD, date:START..END or date:lastNdays"));
    }

    if let Some(m) = regex!(r"^month\s*=\s*(\d{1,2})$").captures(body) {
        return match m[1].parse::<u8>() {
            Ok(month @ 1..=12) => Ok(Modifier::Date(DateCondition::Month(month))),
            _ => Err(err("month must be between 1 and 12")),
        };
    }
    Err(err("expected month=N"))
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse().ok()
}

fn parse_date(text: &str) -> Option<Date> {
    if !regex!(r"^\d{4}-\d{2}-\d{2}$").is_match(text) {
        return None;
    }
    Date::parse(text, format_description!("[year]-[month]-[day]")).ok()
}

impl fmt::Display for AmountCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountCondition::Compare { op, value } => write!(f, "[amount{}{}]", op, value),
            AmountCondition::Range { min, max } => write!(f, "[amount:{}-{}]", min, max),
        }
    }
}

impl fmt::Display for DateCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateCondition::On(day) => write!(f, "[date={}]", day),
            DateCondition::Range { start, end } => write!(f, "[date:{}..{}]", start, end),
            DateCondition::LastDays(n) => write!(f, "[date:last{}days]", n),
            DateCondition::Month(m) => write!(f, "[month={}]", m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn plain_patterns_pass_through() {
        for text in ["COSTCO", "COSTCO(?!.*GAS)", "[A-Z]+COSTCO", "", "AB[0-9]"] {
            let p = parse_pattern(text).unwrap();
            assert_eq!(p.pattern, text);
            assert!(!p.has_conditions());
        }
    }

    #[test]
    fn amount_comparisons() {
        let p = parse_pattern("COSTCO[amount>200]").unwrap();
        assert_eq!(p.pattern, "COSTCO");
        assert_eq!(
            p.amount_conditions,
            vec![AmountCondition::Compare {
                op: Comparison::Gt,
                value: 200.0
            }]
        );
        assert_eq!(p.amount_conditions[0].operator(), ">");

        let p = parse_pattern("BESTBUY[amount=499.99]").unwrap();
        assert_eq!(p.amount_conditions[0].operator(), "=");
    }

    #[test]
    fn amount_range() {
        let p = parse_pattern("RESTAURANT[amount:20-100]").unwrap();
        assert_eq!(
            p.amount_conditions,
            vec![AmountCondition::Range {
                min: 20.0,
                max: 100.0
            }]
        );
        assert!(parse_pattern("X[amount:100-20]").is_err());
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        let range = &parse_pattern("RESTAURANT[amount:20-100]").unwrap().amount_conditions[0];
        assert!(range.holds(20.0));
        assert!(range.holds(100.0));
        assert!(range.holds(55.5));
        assert!(!range.holds(19.99));
        assert!(!range.holds(100.01));

        let at_least = &parse_pattern("COSTCO[amount>=100]").unwrap().amount_conditions[0];
        assert!(at_least.holds(100.0));
        assert!(at_least.holds(150.0));
        assert!(!at_least.holds(99.0));

        let at_most = &parse_pattern("STARBUCKS[amount<=50]").unwrap().amount_conditions[0];
        assert!(at_most.holds(50.0));
        assert!(at_most.holds(25.0));
        assert!(!at_most.holds(51.0));

        let above = &parse_pattern("X[amount>100]").unwrap().amount_conditions[0];
        assert!(!above.holds(100.0));
        let below = &parse_pattern("X[amount<50]").unwrap().amount_conditions[0];
        assert!(!below.holds(50.0));
    }

    #[test]
    fn date_forms() {
        let p = parse_pattern("SUB[date:2025-01-01..2025-06-30]").unwrap();
        assert_eq!(
            p.date_conditions,
            vec![DateCondition::Range {
                start: date!(2025 - 01 - 01),
                end: date!(2025 - 06 - 30)
            }]
        );
        let p = parse_pattern("PURCHASE[date:last30days]").unwrap();
        assert_eq!(p.date_conditions, vec![DateCondition::LastDays(30)]);
        assert_eq!(p.date_conditions[0].operator(), "relative");
        let p = parse_pattern("HOLIDAY[month=12]").unwrap();
        assert_eq!(p.date_conditions, vec![DateCondition::Month(12)]);
    }

    #[test]
    fn malformed_keyword_groups_are_errors() {
        for text in [
            "COSTCO[amount>>100]",
            "HOLIDAY[month=13]",
            "HOLIDAY[month=0]",
            "PURCHASE[date=01-15-2025]",
            "PURCHASE[date=2025-02-30]",
        ] {
            assert!(parse_pattern(text).is_err(), "{text}");
        }
        let e = parse_pattern("HOLIDAY[month=13]").unwrap_err();
        assert_eq!(e.modifier, "month=13");
        assert!(e.to_string().contains("between 1 and 12"));
    }

    #[test]
    fn multiple_modifiers_keep_order() {
        let p = parse_pattern("COSTCO(?!GAS)[amount>200][date=2025-01-15]").unwrap();
        assert_eq!(p.pattern, "COSTCO(?!GAS)");
        assert_eq!(p.amount_conditions.len(), 1);
        assert_eq!(p.date_conditions, vec![DateCondition::On(date!(2025 - 01 - 15))]);

        let p = parse_pattern("PURCHASE[amount>50][amount<200]").unwrap();
        assert_eq!(p.amount_conditions[0].operator(), ">");
        assert_eq!(p.amount_conditions[1].operator(), "<");
    }

    #[test]
    fn amount_equality_epsilon() {
        let c = AmountCondition::Compare {
            op: Comparison::Eq,
            value: 99.99,
        };
        assert!(c.holds(99.99));
        assert!(c.holds(99.991));
        assert!(!c.holds(100.00));
    }

    #[test]
    fn relative_window_is_inclusive() {
        let today = date!(2025 - 03 - 31);
        let c = DateCondition::LastDays(30);
        assert!(c.holds_on(date!(2025 - 03 - 01), today));
        assert!(c.holds_on(today, today));
        assert!(!c.holds_on(date!(2025 - 02 - 28), today));
        assert!(!c.holds_on(date!(2025 - 04 - 01), today));
    }

    #[test]
    fn absent_inputs_fail() {
        let p = parse_pattern("BESTBUY[amount=499.99][date=2025-01-15]").unwrap();
        let today = date!(2025 - 06 - 01);
        assert!(p.check_all_conditions_on(Some(499.99), Some(date!(2025 - 01 - 15)), today));
        assert!(!p.check_all_conditions_on(None, Some(date!(2025 - 01 - 15)), today));
        assert!(!p.check_all_conditions_on(Some(499.99), None, today));
        assert!(parse_pattern("PLAIN").unwrap().check_all_conditions(None, None));
    }
}
