//! The currently published rate table and the fetch cycle that replaces it.

use crate::core::convert::{self, Conversion};
use crate::core::currency::{BaseCurrency, RateFeed};
use crate::core::error::Result;
use crate::core::table::RateTable;
use chrono::NaiveDate;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a refresh request.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh {
    /// A new table replaced the previous one.
    Published {
        currencies: usize,
        date: Option<NaiveDate>,
    },
    /// Another fetch was still running, so this request was ignored.
    InFlight,
}

/// Holds the table conversions are served from.
///
/// Readers always see a complete table: publication swaps the `Arc` under a short write
/// lock. At most one fetch runs at a time.
pub struct RateBoard {
    base: BaseCurrency,
    current: RwLock<Arc<RateTable>>,
    fetching: Mutex<()>,
}

impl RateBoard {
    pub fn new(base: BaseCurrency) -> Self {
        let empty = RateTable::empty(&base);
        RateBoard {
            base,
            current: RwLock::new(Arc::new(empty)),
            fetching: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<RateTable> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    fn publish(&self, table: RateTable) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(table);
    }

    /// Fetches the feed and publishes a fresh table.
    ///
    /// On failure the previously published table stays in effect.
    pub async fn refresh(&self, feed: &dyn RateFeed) -> Result<Refresh> {
        let Ok(_guard) = self.fetching.try_lock() else {
            debug!("Fetch already in flight, ignoring refresh request");
            return Ok(Refresh::InFlight);
        };

        let snapshot = feed.fetch().await.inspect_err(|e| {
            warn!(error = %e, "Keeping previous rate table");
        })?;

        let table = RateTable::from_snapshot(&snapshot, &self.base);
        let outcome = Refresh::Published {
            currencies: table.len(),
            date: table.date(),
        };
        self.publish(table);
        info!(?outcome, "Published rate table");
        Ok(outcome)
    }

    /// Parses the user's amount text and converts it using the current table.
    pub fn convert_text(&self, amount: &str, from: &str, to: &str) -> Result<Conversion> {
        let amount = convert::parse_amount(amount)?;
        convert::convert(&self.snapshot(), amount, from, to)
    }
}
