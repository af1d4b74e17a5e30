use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// One payment as seen by the classifier. Amounts are positive for spending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub merchant: String,
    pub amount: f64,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Transaction {
    pub fn new(merchant: impl Into<String>, amount: f64, date: Date) -> Self {
        Transaction {
            merchant: merchant.into(),
            amount,
            date,
            category: String::new(),
            subcategory: String::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn categorized(mut self, category: &str, subcategory: &str) -> Self {
        self.category = category.to_string();
        self.subcategory = subcategory.to_string();
        self
    }

    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Calendar month key used for grouping.
    pub fn month_key(&self) -> (i32, u8) {
        (self.date.year(), self.date.month() as u8)
    }
}
