//! Clients for the external data providers

pub mod cache;
pub mod duckduckgo;
pub mod yahoo;

use crate::error::Result;
use crate::model::{DateRange, PriceSeries};
use async_trait::async_trait;

pub use cache::HeldPrices;
pub use duckduckgo::{DuckDuckGoClient, NewsSearch, SearchBackend};
pub use yahoo::YahooFinanceClient;

#[cfg(test)]
pub use duckduckgo::MockNewsSearch;

/// Source of daily price history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Daily bars for `ticker` within `range`; never returns an empty series
    async fn fetch_history(&self, ticker: &str, range: &DateRange) -> Result<PriceSeries>;
}
