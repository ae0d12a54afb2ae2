//! Yahoo Finance chart API client

use super::PriceSource;
use crate::error::{Result, StockError};
use crate::model::{DateRange, PriceBar, PriceSeries};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stock-crew/0.1";

/// Daily history from `/v8/finance/chart`
#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl YahooFinanceClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StockError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at another host, e.g. a local stub
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn chart_url(&self, ticker: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(ticker.as_bytes()).collect();
        format!("{}/v8/finance/chart/{encoded}", self.base_url)
    }
}

#[async_trait]
impl PriceSource for YahooFinanceClient {
    async fn fetch_history(&self, ticker: &str, range: &DateRange) -> Result<PriceSeries> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(StockError::InvalidSymbol(ticker.to_string()));
        }

        tracing::debug!(ticker, %range, "Fetching price history");

        let fetch_err = |reason: String| StockError::Fetch {
            ticker: ticker.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.chart_url(ticker))
            .query(&[
                ("period1", range.period1().to_string()),
                ("period2", range.period2().to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(|e| fetch_err(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StockError::NoData {
                ticker: ticker.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fetch_err(format!("HTTP {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fetch_err(format!("failed to read body: {e}")))?;

        let series = parse_chart(ticker, &body)?;
        tracing::info!(ticker, bars = series.len(), "Fetched price history");
        Ok(series)
    }
}

/// Turn a chart response body into a series
///
/// Rows without a close are skipped. Dates are in the exchange's time zone.
pub(crate) fn parse_chart(ticker: &str, body: &str) -> Result<PriceSeries> {
    let no_data = || StockError::NoData {
        ticker: ticker.to_string(),
    };

    let response: ChartResponse = serde_json::from_str(body).map_err(|e| StockError::Fetch {
        ticker: ticker.to_string(),
        reason: format!("invalid chart response: {e}"),
    })?;

    if let Some(err) = response.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(no_data());
        }
        return Err(StockError::Fetch {
            ticker: ticker.to_string(),
            reason: format!("{}: {}", err.code, err.description),
        });
    }

    let Some(result) = response.chart.result.and_then(|mut r| r.pop()) else {
        return Err(no_data());
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();

    let bars: Vec<PriceBar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = at(&quote.close, i)?;
            let date = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)?.date_naive();
            Some(PriceBar {
                date,
                open: at(&quote.open, i).unwrap_or(close),
                high: at(&quote.high, i).unwrap_or(close),
                low: at(&quote.low, i).unwrap_or(close),
                close,
                adj_close: at(&adjclose, i).unwrap_or(close),
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            })
        })
        .collect();

    PriceSeries::new(ticker, bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_stub;

    const AAPL_BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL", "gmtoffset": -14400},
                "timestamp": [1691501400, 1691587800, 1691674200],
                "indicators": {
                    "quote": [{
                        "open": [179.69, 180.87, 179.48],
                        "high": [180.27, 180.93, 180.75],
                        "low": [177.58, 177.01, 177.6],
                        "close": [179.8, 178.19, null],
                        "volume": [67823000, 60378500, null]
                    }],
                    "adjclose": [{"adjclose": [178.9, 177.3, null]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart() {
        let series = parse_chart("AAPL", AAPL_BODY).unwrap();

        assert_eq!(series.ticker(), "AAPL");
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().date.to_string(), "2023-08-08");
        assert_eq!(series.first().close, 179.8);
        assert_eq!(series.first().adj_close, 178.9);
        assert_eq!(series.last().volume, 60_378_500);
    }

    #[test]
    fn test_not_found_is_no_data() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("ZZZZINVALID", body).unwrap_err();
        assert!(matches!(err, StockError::NoData { ref ticker } if ticker == "ZZZZINVALID"));
    }

    #[test]
    fn test_all_closes_missing_is_no_data() {
        let body = r#"{"chart":{"result":[{"meta":{},"timestamp":[1691501400],
            "indicators":{"quote":[{"close":[null]}]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart("AAPL", body),
            Err(StockError::NoData { .. })
        ));
    }

    #[test]
    fn test_no_timestamps_is_no_data() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart("AAPL", body),
            Err(StockError::NoData { .. })
        ));
    }

    #[test]
    fn test_other_errors_are_fetch_errors() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(matches!(
            parse_chart("AAPL", body),
            Err(StockError::Fetch { .. })
        ));

        assert!(matches!(
            parse_chart("AAPL", "<html>oops</html>"),
            Err(StockError::Fetch { .. })
        ));
    }

    async fn chart_stub(status: StatusCode, body: &'static str) -> YahooFinanceClient {
        let router = axum::Router::new().route(
            "/v8/finance/chart/:ticker",
            axum::routing::get(move || async move { (status, body) }),
        );
        YahooFinanceClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(serve_stub(router).await)
    }

    #[tokio::test]
    async fn test_http_not_found_is_no_data() {
        let client = chart_stub(StatusCode::NOT_FOUND, "").await;
        let err = client
            .fetch_history("ZZZZINVALID", &DateRange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::NoData { ref ticker } if ticker == "ZZZZINVALID"));
    }

    #[tokio::test]
    async fn test_http_server_error_is_fetch_error() {
        let client = chart_stub(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let err = client
            .fetch_history("AAPL", &DateRange::default())
            .await
            .unwrap_err();
        match err {
            StockError::Fetch { ticker, reason } => {
                assert_eq!(ticker, "AAPL");
                assert!(reason.contains("500"));
                assert!(reason.contains("boom"));
            }
            other => panic!("Expected Fetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_ok_without_rows_is_no_data() {
        let client = chart_stub(
            StatusCode::OK,
            r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#,
        )
        .await;
        let err = client
            .fetch_history("AAPL", &DateRange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_http_ok_parses_series() {
        let client = chart_stub(StatusCode::OK, AAPL_BODY).await;
        let series = client
            .fetch_history("aapl ", &DateRange::default())
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_chart_url_encodes_ticker() {
        let client = YahooFinanceClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(
            client.chart_url("BRK B"),
            "http://localhost:9999/v8/finance/chart/BRK+B"
        );
        assert_eq!(
            client.chart_url("BTC-USD"),
            "http://localhost:9999/v8/finance/chart/BTC-USD"
        );
    }

    #[tokio::test]
    async fn test_blank_ticker_is_invalid_symbol() {
        // Unroutable base URL; the call must fail before any request
        let client = YahooFinanceClient::new(Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let err = client
            .fetch_history("   ", &DateRange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidSymbol(_)));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_fetch() {
        let client = YahooFinanceClient::new(Duration::from_secs(30)).unwrap();
        let series = client
            .fetch_history("AAPL", &DateRange::default())
            .await
            .unwrap();
        assert!(series.len() > 200);

        let err = client
            .fetch_history("ZZZZINVALID", &DateRange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::NoData { .. }));
    }
}
