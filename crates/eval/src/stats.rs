//! Per-merchant grouping and the statistics the rule engine reads.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::numeric::{mean, population_stddev};
use crate::rules::RuleSet;
use crate::types::Transaction;

/// Period assumed when there are no transactions at all.
pub const DEFAULT_PERIOD_MONTHS: u32 = 12;

/// Tags (any case) that mark money moving rather than money spent.
pub const EXCLUDED_TAGS: [&str; 2] = ["income", "transfer"];

/// The first excluding tag on `txn`, lowercased, if any.
pub fn exclusion_tag(txn: &Transaction) -> Option<&'static str> {
    EXCLUDED_TAGS
        .into_iter()
        .find(|excluded| txn.tags.iter().any(|t| t.eq_ignore_ascii_case(excluded)))
}

/// Whether `txn` counts toward spending figures.
pub fn is_spending(txn: &Transaction) -> bool {
    exclusion_tag(txn).is_none()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantStats {
    pub category: String,
    pub subcategory: String,
    pub months_active: u32,
    pub count: u32,
    pub total: f64,
    /// Coefficient of variation of the monthly totals.
    pub cv: f64,
    pub max_payment: f64,
}

impl MerchantStats {
    /// Statistics for one merchant's transactions. Category and
    /// subcategory come from the last transaction.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut monthly: BTreeMap<(i32, u8), f64> = BTreeMap::new();
        let mut total = 0.0;
        let mut max_payment: f64 = 0.0;
        for txn in transactions {
            *monthly.entry(txn.month_key()).or_default() += txn.amount;
            total += txn.amount;
            max_payment = max_payment.max(txn.amount);
        }

        let monthly: Vec<f64> = monthly.into_values().collect();
        let cv = if monthly.len() >= 2 {
            let m = mean(&monthly);
            if m > 0.0 {
                population_stddev(&monthly) / m
            } else {
                0.0
            }
        } else {
            0.0
        };

        let last = transactions.last();
        MerchantStats {
            category: last.map(|t| t.category.clone()).unwrap_or_default(),
            subcategory: last.map(|t| t.subcategory.clone()).unwrap_or_default(),
            months_active: monthly.len() as u32,
            count: transactions.len() as u32,
            total,
            cv,
            max_payment,
        }
    }

    /// `total / count`, 0 without transactions.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    /// `max / avg`, 0 unless the average is positive.
    pub fn max_avg_ratio(&self) -> f64 {
        let avg = self.avg();
        if avg > 0.0 {
            self.max_payment / avg
        } else {
            0.0
        }
    }
}

/// All transactions of one merchant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantGroup {
    pub merchant: String,
    pub category: String,
    pub subcategory: String,
    pub transactions: Vec<Transaction>,
}

impl MerchantGroup {
    pub fn stats(&self) -> MerchantStats {
        MerchantStats::from_transactions(&self.transactions)
    }

    pub fn total(&self) -> f64 {
        self.transactions.iter().map(|t| t.amount).sum()
    }

    /// The transactions with category and subcategory replaced by the
    /// merchant's.
    pub fn recategorized_transactions(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .map(|t| Transaction {
                category: self.category.clone(),
                subcategory: self.subcategory.clone(),
                ..t.clone()
            })
            .collect()
    }
}

/// Group spending transactions by merchant, in order of first appearance.
/// Transactions tagged `income` or `transfer` are left out.
pub fn group_by_merchant(transactions: &[Transaction]) -> Vec<MerchantGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<MerchantGroup> = Vec::new();
    for txn in transactions.iter().filter(|t| is_spending(t)) {
        let slot = *index.entry(txn.merchant.as_str()).or_insert_with(|| {
            groups.push(MerchantGroup {
                merchant: txn.merchant.clone(),
                category: String::new(),
                subcategory: String::new(),
                transactions: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.category = txn.category.clone();
        group.subcategory = txn.subcategory.clone();
        group.transactions.push(txn.clone());
    }
    groups
}

/// Distinct months with spending; 12 when there is none.
pub fn period_months(transactions: &[Transaction]) -> u32 {
    let months: BTreeSet<(i32, u8)> = transactions
        .iter()
        .filter(|t| is_spending(t))
        .map(|t| t.month_key())
        .collect();
    if months.is_empty() {
        DEFAULT_PERIOD_MONTHS
    } else {
        months.len() as u32
    }
}

/// Aggregate figures for the merchants of one section.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SectionTotals {
    pub total: f64,
    /// Sum of each merchant's monthly figure under its classification.
    pub monthly: f64,
    pub count: usize,
}

impl SectionTotals {
    pub fn compute(merchants: &[&MerchantGroup], rules: &RuleSet, num_months: u32) -> Self {
        merchants.iter().fold(SectionTotals::default(), |mut acc, group| {
            let stats = group.stats();
            let classification = rules.classify(&stats, num_months);
            acc.total += stats.total;
            acc.monthly += classification
                .calc_type
                .monthly_value(stats.total, stats.months_active);
            acc.count += 1;
            acc
        })
    }
}
