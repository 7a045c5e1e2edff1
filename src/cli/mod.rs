//! Terminal presentation of the rate board. No conversion logic lives here.

pub mod convert;
pub mod interactive;
pub mod rates;
pub mod setup;
pub mod ui;
