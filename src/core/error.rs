//! Error taxonomy shared by the feed parser, the conversion engine and the fetch path.

use thiserror::Error;

/// Every failure a single operation can end with. None of them is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    /// Network or transport failure while downloading the feed.
    #[error("Feed unavailable: {0}")]
    Fetch(String),

    /// Structurally broken feed or a malformed numeric field.
    #[error("Malformed rate feed: {0}")]
    Parse(String),

    /// Empty, non-numeric or disallowed amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Code absent from the currently published table.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

pub type Result<T, E = RateError> = std::result::Result<T, E>;
