//! Core business logic: feed parsing, rate tables and conversion

pub mod board;
pub mod config;
pub mod convert;
pub mod currency;
pub mod error;
pub mod feed;
pub mod log;
pub mod table;

// Re-export main types for cleaner imports
pub use board::{RateBoard, Refresh};
pub use convert::Conversion;
pub use currency::{BaseCurrency, CurrencyRecord, FeedSnapshot, RateFeed};
pub use error::RateError;
pub use table::RateTable;
