//! Series held for the submissions in flight
//!
//! The research service fetches every ticker once for the chart and holds
//! the series here while the crew runs, so the price tool reads the same
//! bars instead of calling Yahoo again. Entries are released when the
//! submission ends; nothing outlives it.

use super::PriceSource;
use crate::error::Result;
use crate::model::{DateRange, PriceSeries};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HeldKey {
    ticker: String,
    range: DateRange,
}

impl HeldKey {
    fn new(ticker: &str, range: &DateRange) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            range: *range,
        }
    }
}

#[derive(Debug)]
struct Held {
    series: PriceSeries,
    holders: usize,
}

/// [`PriceSource`] that serves held series and falls through otherwise
pub struct HeldPrices {
    inner: Arc<dyn PriceSource>,
    held: RwLock<HashMap<HeldKey, Held>>,
}

impl HeldPrices {
    pub fn new(inner: Arc<dyn PriceSource>) -> Self {
        Self {
            inner,
            held: RwLock::new(HashMap::new()),
        }
    }

    /// The source behind the held entries
    pub fn source(&self) -> Arc<dyn PriceSource> {
        Arc::clone(&self.inner)
    }

    /// Keep `series` until a matching [`release`](Self::release)
    pub async fn hold(&self, series: &PriceSeries, range: &DateRange) {
        let mut held = self.held.write().await;
        held.entry(HeldKey::new(series.ticker(), range))
            .and_modify(|h| {
                h.series = series.clone();
                h.holders += 1;
            })
            .or_insert_with(|| Held {
                series: series.clone(),
                holders: 1,
            });
    }

    /// Drop one hold per ticker; the entry goes once nobody holds it
    pub async fn release(&self, tickers: &[String], range: &DateRange) {
        let mut held = self.held.write().await;
        for ticker in tickers {
            let key = HeldKey::new(ticker, range);
            if let Some(h) = held.get_mut(&key) {
                h.holders = h.holders.saturating_sub(1);
                if h.holders == 0 {
                    held.remove(&key);
                }
            }
        }
    }

    pub async fn held_count(&self) -> usize {
        self.held.read().await.len()
    }
}

#[async_trait]
impl PriceSource for HeldPrices {
    async fn fetch_history(&self, ticker: &str, range: &DateRange) -> Result<PriceSeries> {
        let key = HeldKey::new(ticker, range);
        if let Some(h) = self.held.read().await.get(&key) {
            tracing::debug!(ticker = %key.ticker, "Serving held price history");
            return Ok(h.series.clone());
        }
        self.inner.fetch_history(ticker, range).await
    }
}
