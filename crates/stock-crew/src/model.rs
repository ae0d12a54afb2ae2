//! Market data types shared by the fetcher, the tools and the chart

use crate::error::{Result, StockError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive start, exclusive end, in calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(StockError::Config(format!(
                "date range start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| StockError::Config(format!("invalid date '{s}': {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Unix seconds at midnight UTC of `start`
    pub fn period1(&self) -> i64 {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
    }

    /// Unix seconds at midnight UTC of `end`
    pub fn period2(&self) -> i64 {
        self.end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 8, 8).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2024, 8, 8).unwrap_or(NaiveDate::MAX),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// One trading day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

/// Daily bars for one ticker, ascending by date, never empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts the bars; an empty vector is [`StockError::NoData`]
    pub fn new(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Result<Self> {
        let ticker = ticker.into();
        if bars.is_empty() {
            return Err(StockError::NoData { ticker });
        }
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false; kept for the `len` convention
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Percent change from first to last close
    pub fn change_pct(&self) -> f64 {
        let first = self.first().close;
        if first == 0.0 {
            return 0.0;
        }
        (self.last().close - first) / first * 100.0
    }

    pub fn high(&self) -> f64 {
        self.bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn low(&self) -> f64 {
        self.bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min)
    }
}

/// A news search hit, passed to the model as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub date: Option<DateTime<Utc>>,
    pub url: String,
}

#[cfg(test)]
pub(crate) fn bar(date: &str, close: f64) -> PriceBar {
    PriceBar {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        adj_close: close,
        volume: 1_000,
    }
}
