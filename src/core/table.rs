//! Immutable snapshot of unit rates built from one fetched feed.

use crate::core::currency::{BaseCurrency, CurrencyRecord, FeedSnapshot};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    base: BaseCurrency,
    date: Option<NaiveDate>,
    rates: HashMap<String, f64>,
    names: HashMap<String, String>,
    /// Listing order: base first, then codes as first seen in the feed.
    order: Vec<String>,
}

impl RateTable {
    /// Table in effect before any fetch completed. It knows no currency at all.
    pub fn empty(base: &BaseCurrency) -> Self {
        RateTable {
            base: base.normalized(),
            date: None,
            rates: HashMap::new(),
            names: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Builds a table from parsed records.
    ///
    /// A later record with the same code replaces the rate and name of an earlier one.
    /// The base currency is inserted last at exactly 1.0, whatever the feed says about it.
    pub fn build<'a, I>(records: I, base: &BaseCurrency) -> Self
    where
        I: IntoIterator<Item = &'a CurrencyRecord>,
    {
        let mut table = RateTable::empty(base);
        let base_code = table.base.code.clone();
        table.order.push(base_code.clone());

        for record in records {
            let rate = record.unit_rate();
            if !(rate.is_finite() && rate > 0.0) {
                warn!("Dropping {} with non-positive unit rate {}", record.code, rate);
                continue;
            }
            if record.code == base_code {
                debug!("Feed lists the base currency {}, ignoring its rate", base_code);
                continue;
            }
            if table.rates.insert(record.code.clone(), rate).is_none() {
                table.order.push(record.code.clone());
            }
            table.names.insert(record.code.clone(), record.name.clone());
        }

        table.rates.insert(base_code.clone(), 1.0);
        table.names.insert(base_code, table.base.name.clone());
        debug!(currencies = table.order.len(), "Built rate table");
        table
    }

    pub fn from_snapshot(snapshot: &FeedSnapshot, base: &BaseCurrency) -> Self {
        let mut table = RateTable::build(&snapshot.records, base);
        table.date = snapshot.date;
        table
    }

    pub fn base(&self) -> &BaseCurrency {
        &self.base
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Base-currency price of one unit of `code`.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn name(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    /// `(code, display name)` pairs for selection lists.
    pub fn currencies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(|code| (code.as_str(), self.names[code].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
