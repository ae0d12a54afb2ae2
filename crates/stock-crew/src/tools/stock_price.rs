//! `Yahoo Finance Tool`: price history with a short summary

use crate::api::PriceSource;
use crate::error::StockError;
use crate::model::{DateRange, PriceSeries};
use async_trait::async_trait;
use crew_core::Result as CrewResult;
use crew_llm::tools::schema;
use crew_tools::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use ta::Next;
use ta::indicators::SimpleMovingAverage;

pub const TOOL_NAME: &str = "Yahoo Finance Tool";

/// Bars included verbatim in the tool output
const RECENT_BARS: usize = 30;
/// Minimum move, in percent, before a trend is called up or down
const TREND_THRESHOLD_PCT: f64 = 5.0;

/// Fetches the configured year of daily prices for one ticker
pub struct StockPriceTool {
    source: Arc<dyn PriceSource>,
    range: DateRange,
}

#[derive(Debug, Deserialize)]
struct StockPriceParams {
    #[serde(alias = "ticket", alias = "symbol")]
    ticker: String,
}

impl StockPriceTool {
    pub fn new(source: Arc<dyn PriceSource>, range: DateRange) -> Self {
        Self { source, range }
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    async fn execute(&self, params: Value) -> CrewResult<Value> {
        let params: StockPriceParams = serde_json::from_value(params).map_err(|e| {
            crew_core::Error::InvalidInput(format!("Invalid parameters: {e}"))
        })?;

        let ticker = params.ticker.trim().to_uppercase();
        if ticker.contains(',') {
            return Err(crew_core::Error::InvalidInput(format!(
                "'{ticker}' looks like several tickers; call this tool once per ticker"
            )));
        }
        if ticker.is_empty() {
            return Err(StockError::InvalidSymbol(ticker).into());
        }

        let series = self.source.fetch_history(&ticker, &self.range).await?;
        Ok(summarize(&series, &self.range))
    }

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Fetches stocks prices for a ticker from the last year about a specific company \
         from Yahoo Finance API. Returns a summary with moving averages and the most \
         recent daily bars."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({ "ticker": schema::string("Ticker symbol, e.g. AAPL") }),
            &["ticker"],
        )
    }
}

fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period {
        return None;
    }
    let mut sma = SimpleMovingAverage::new(period).ok()?;
    closes.iter().fold(None, |_, &c| Some(sma.next(c)))
}

/// `up`, `down` or `sideways` from the last close, the moving averages and the
/// change over the range
pub(crate) fn trend_hint(
    last: f64,
    change_pct: f64,
    sma20: Option<f64>,
    sma50: Option<f64>,
) -> &'static str {
    match (sma20, sma50) {
        (Some(s20), Some(s50)) => {
            if last > s20 && s20 > s50 && change_pct > TREND_THRESHOLD_PCT {
                "up"
            } else if last < s20 && s20 < s50 && change_pct < -TREND_THRESHOLD_PCT {
                "down"
            } else {
                "sideways"
            }
        }
        _ if change_pct > TREND_THRESHOLD_PCT => "up",
        _ if change_pct < -TREND_THRESHOLD_PCT => "down",
        _ => "sideways",
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn summarize(series: &PriceSeries, range: &DateRange) -> Value {
    let closes = series.closes();
    let sma20 = sma(&closes, 20);
    let sma50 = sma(&closes, 50);
    let last = series.last();
    let change = series.change_pct();

    let recent = &series.bars()[series.len().saturating_sub(RECENT_BARS)..];

    json!({
        "ticker": series.ticker(),
        "range": { "start": range.start, "end": range.end },
        "summary": {
            "trading_days": series.len(),
            "first_date": series.first().date,
            "first_close": round2(series.first().close),
            "last_date": last.date,
            "last_close": round2(last.close),
            "change_pct": round2(change),
            "high": round2(series.high()),
            "low": round2(series.low()),
            "sma20": sma20.map(round2),
            "sma50": sma50.map(round2),
            "trend_hint": trend_hint(last.close, change, sma20, sma50),
        },
        "recent_bars": recent,
    })
}
