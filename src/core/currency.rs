//! Currency records and the rate feed abstraction

use crate::core::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One `Valute` entry of the daily feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyRecord {
    pub code: String,
    pub name: String,
    /// Number of foreign units the quoted value applies to.
    pub nominal: f64,
    /// Quoted price of `nominal` units in the base currency.
    pub value: f64,
}

impl CurrencyRecord {
    /// Price of exactly one unit of this currency in the base currency.
    pub fn unit_rate(&self) -> f64 {
        self.value / self.nominal
    }
}

/// The currency all feed rates are quoted in. It always has rate 1.0.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BaseCurrency {
    pub code: String,
    pub name: String,
}

impl BaseCurrency {
    /// Same currency with its code trimmed and upper-cased, the form codes are looked up in.
    pub fn normalized(&self) -> Self {
        BaseCurrency {
            code: self.code.trim().to_ascii_uppercase(),
            name: self.name.clone(),
        }
    }
}

impl Default for BaseCurrency {
    fn default() -> Self {
        BaseCurrency {
            code: "RUB".to_string(),
            name: "Российский рубль".to_string(),
        }
    }
}

/// Everything read from one complete feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// Effective date declared by the feed root, if any.
    pub date: Option<NaiveDate>,
    pub records: Vec<CurrencyRecord>,
}

#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn fetch(&self) -> Result<FeedSnapshot>;
}
