//! Conversion between any two currencies of a rate table via the common base.

use crate::core::error::{RateError, Result};
use crate::core::table::RateTable;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Display;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub result: f64,
}

impl Display for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} = {} {}",
            format_amount(self.amount),
            self.from,
            format_amount(self.result),
            self.to
        )
    }
}

/// Parses user input into a finite, non-negative amount.
pub fn parse_amount(text: &str) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RateError::InvalidAmount("amount is empty".to_string()));
    }
    let amount: f64 = text
        .parse()
        .map_err(|_| RateError::InvalidAmount(format!("'{text}' is not a number")))?;
    check_amount(amount)?;
    Ok(amount)
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(RateError::InvalidAmount(format!("{amount} is not finite")));
    }
    if amount < 0.0 {
        return Err(RateError::InvalidAmount(format!("{amount} is negative")));
    }
    Ok(())
}

fn lookup(table: &RateTable, code: &str) -> Result<(String, f64)> {
    let code = code.trim().to_ascii_uppercase();
    match table.rate(&code) {
        Some(rate) => Ok((code, rate)),
        None => Err(RateError::UnknownCurrency(code)),
    }
}

/// Converts `amount` units of `from` into `to`: `amount * rate(from) / rate(to)`.
pub fn convert(table: &RateTable, amount: f64, from: &str, to: &str) -> Result<Conversion> {
    check_amount(amount)?;
    let (from, from_rate) = lookup(table, from)?;
    let (to, to_rate) = lookup(table, to)?;

    let result = amount * from_rate / to_rate;
    if !result.is_finite() {
        return Err(RateError::InvalidAmount("result is out of range".to_string()));
    }
    debug!(amount, %from, %to, result, "Converted");

    Ok(Conversion {
        amount,
        from,
        to,
        result,
    })
}

/// Two decimal places, midpoints rounded away from zero.
pub fn format_amount(value: f64) -> String {
    match Decimal::from_f64(value) {
        Some(decimal) => {
            let rounded = decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            format!("{rounded:.2}")
        }
        None => format!("{value:.2}"),
    }
}
