//! One research submission: validate, fetch, chart, orchestrate
//!
//! Shared by the dashboard and the CLI. Each call to
//! [`ResearchService::run`] is independent; the service holds only
//! read-only clients.

use crate::api::{DuckDuckGoClient, HeldPrices, PriceSource, YahooFinanceClient};
use crate::chart;
use crate::config::AppConfig;
use crate::crew::{build_stock_crew, kickoff_inputs};
use crate::error::{Result, StockError};
use crate::model::{DateRange, PriceSeries};
use async_trait::async_trait;
use chrono::NaiveDate;
use crew_core::Inputs;
use crew_llm::{OpenAIConfig, OpenAIProvider, TokenUsage};
use crew_runtime::{Crew, CrewEventHandler, CrewOutput};
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};

/// Where a submission is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingSubmission,
    Validating,
    Fetching,
    Orchestrating,
    Rendering,
}

impl Phase {
    /// Whether `next` may follow `self`
    ///
    /// Validation and fetch failures skip straight to rendering the error.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::{AwaitingSubmission, Fetching, Idle, Orchestrating, Rendering, Validating};
        matches!(
            (self, next),
            (Idle, AwaitingSubmission)
                | (AwaitingSubmission, Validating)
                | (Validating, Fetching | Rendering)
                | (Fetching, Orchestrating | Rendering)
                | (Orchestrating, Rendering)
                | (Rendering, Idle)
        )
    }
}

#[derive(Debug)]
struct PhaseLog {
    visited: Vec<Phase>,
}

impl PhaseLog {
    fn start() -> Self {
        Self {
            visited: vec![Phase::AwaitingSubmission],
        }
    }

    fn current(&self) -> Phase {
        self.visited.last().copied().unwrap_or(Phase::Idle)
    }

    fn advance(&mut self, next: Phase) {
        let current = self.current();
        if !current.can_advance_to(next) {
            warn!(?current, ?next, "unexpected phase transition");
        }
        tracing::debug!(?current, ?next, "phase");
        self.visited.push(next);
    }
}

/// Tickers and range for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchRequest {
    tickers: Vec<String>,
    range: DateRange,
}

impl ResearchRequest {
    /// Trims and upper-cases, drops blanks and repeats; first seen wins
    pub fn new<I, S>(tickers: I, range: DateRange) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ticker in tickers {
            let ticker = ticker.as_ref().trim().to_uppercase();
            if !ticker.is_empty() && !normalized.contains(&ticker) {
                normalized.push(ticker);
            }
        }
        Self {
            tickers: normalized,
            range,
        }
    }

    /// Combine the free-text field (comma separated) with the multi-select
    pub fn from_form(text: &str, selected: &[String], range: DateRange) -> Self {
        Self::new(
            text.split(',').chain(selected.iter().map(String::as_str)),
            range,
        )
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// Runs the crew for a set of inputs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn run(&self, inputs: &Inputs) -> Result<CrewOutput>;
}

/// [`Orchestrator`] backed by the stock research [`Crew`]
pub struct CrewOrchestrator {
    crew: Crew,
}

impl CrewOrchestrator {
    pub fn new(crew: Crew) -> Self {
        Self { crew }
    }
}

#[async_trait]
impl Orchestrator for CrewOrchestrator {
    async fn run(&self, inputs: &Inputs) -> Result<CrewOutput> {
        Ok(self.crew.kickoff(inputs).await?)
    }
}

/// Price statistics shown next to the chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub ticker: String,
    pub trading_days: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub first_close: f64,
    pub last_close: f64,
    pub change_pct: f64,
    pub high: f64,
    pub low: f64,
}

impl From<&PriceSeries> for SeriesSummary {
    fn from(series: &PriceSeries) -> Self {
        Self {
            ticker: series.ticker().to_string(),
            trading_days: series.len(),
            first_date: series.first().date,
            last_date: series.last().date,
            first_close: series.first().close,
            last_close: series.last().close,
            change_pct: series.change_pct(),
            high: series.high(),
            low: series.low(),
        }
    }
}

/// A ticker that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub error: String,
}

/// Everything the surfaces render for one submission
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    /// Tickers with data, in request order
    pub tickers: Vec<String>,
    #[serde(skip)]
    pub series: Vec<PriceSeries>,
    pub summaries: Vec<SeriesSummary>,
    pub failures: Vec<TickerFailure>,
    pub chart_svg: String,
    /// Final newsletter in markdown
    pub report: Option<String>,
    /// Set instead of `report` when the crew failed
    pub report_error: Option<String>,
    pub token_usage: Option<TokenUsage>,
    pub phases: Vec<Phase>,
}

/// Validates submissions and drives the fetch and crew stages
pub struct ResearchService {
    prices: Arc<dyn PriceSource>,
    held: Arc<HeldPrices>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl ResearchService {
    pub fn new(prices: Arc<dyn PriceSource>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self::with_held_prices(Arc::new(HeldPrices::new(prices)), orchestrator)
    }

    /// Share `held` with the crew's price tool so it reuses this run's fetch
    pub fn with_held_prices(held: Arc<HeldPrices>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            prices: held.source(),
            held,
            orchestrator,
        }
    }

    /// Wire Yahoo Finance, DuckDuckGo and OpenAI from configuration
    ///
    /// Fails with [`StockError::Config`] when the API key is missing.
    pub fn from_config(
        config: &AppConfig,
        events: Option<Arc<dyn CrewEventHandler>>,
    ) -> Result<Self> {
        let api_key = config.require_api_key()?;
        let timeout = config.http_timeout;

        let mut llm_config = OpenAIConfig::new(api_key).with_timeout(timeout.as_secs());
        if let Some(base) = &config.openai_api_base {
            llm_config = llm_config.with_api_base(base);
        }
        let provider = Arc::new(OpenAIProvider::with_config(llm_config)?);

        let yahoo: Arc<dyn PriceSource> = Arc::new(YahooFinanceClient::new(timeout)?);
        let held = Arc::new(HeldPrices::new(yahoo));
        let news = Arc::new(DuckDuckGoClient::new(timeout, config.news_rate_per_minute)?);

        let tool_prices: Arc<dyn PriceSource> = Arc::<HeldPrices>::clone(&held);
        let crew = build_stock_crew(provider, tool_prices, news, config, events)?;
        info!(
            model = %config.model,
            range = %config.date_range,
            backend = ?config.news_backend,
            "Research service ready"
        );

        Ok(Self::with_held_prices(held, Arc::new(CrewOrchestrator::new(crew))))
    }

    /// Run one submission end to end
    ///
    /// Returns an error, without calling the crew, when the selection is
    /// empty or no ticker has data. A crew failure is reported inside the
    /// returned report so the chart still renders.
    pub async fn run(&self, request: &ResearchRequest) -> Result<ResearchReport> {
        let span = info_span!("research", tickers = %request.tickers().join(","));
        self.run_phases(request).instrument(span).await
    }

    async fn run_phases(&self, request: &ResearchRequest) -> Result<ResearchReport> {
        let mut phases = PhaseLog::start();
        phases.advance(Phase::Validating);

        if request.is_empty() {
            phases.advance(Phase::Rendering);
            warn!("Empty ticker selection");
            return Err(StockError::EmptySelection);
        }

        phases.advance(Phase::Fetching);
        let mut series = Vec::new();
        let mut failures = Vec::new();
        let mut last_error = None;

        for ticker in request.tickers() {
            match self.prices.fetch_history(ticker, request.range()).await {
                Ok(s) => series.push(s),
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "Price fetch failed");
                    failures.push(TickerFailure {
                        ticker: ticker.clone(),
                        error: e.to_string(),
                    });
                    last_error = Some(e);
                }
            }
        }

        if series.is_empty() {
            phases.advance(Phase::Rendering);
            return Err(match (request.tickers().len(), last_error) {
                (1, Some(e)) => e,
                _ => StockError::AllTickersFailed {
                    tickers: request.tickers().to_vec(),
                },
            });
        }

        let tickers: Vec<String> = series.iter().map(|s| s.ticker().to_string()).collect();
        let chart_svg = chart::render_svg(&series);

        phases.advance(Phase::Orchestrating);
        for s in &series {
            self.held.hold(s, request.range()).await;
        }
        let inputs = kickoff_inputs(&tickers, &chrono::Local::now());
        let outcome = self.orchestrator.run(&inputs).await;
        self.held.release(&tickers, request.range()).await;

        let (report, report_error, token_usage) = match outcome {
            Ok(output) => {
                info!(
                    tasks = output.tasks_output.len(),
                    tokens = output.token_usage.total(),
                    "Research crew finished"
                );
                (Some(output.final_output), None, Some(output.token_usage))
            }
            Err(e) => {
                error!(error = %e, "Research crew failed");
                (None, Some(e.to_string()), None)
            }
        };

        phases.advance(Phase::Rendering);
        phases.advance(Phase::Idle);

        Ok(ResearchReport {
            summaries: series.iter().map(SeriesSummary::from).collect(),
            tickers,
            series,
            failures,
            chart_svg,
            report,
            report_error,
            token_usage,
            phases: phases.visited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockPriceSource;
    use crate::model::bar;
    use crew_runtime::{CrewError, TaskOutput};

    fn aapl() -> PriceSeries {
        PriceSeries::new(
            "AAPL",
            vec![bar("2023-08-08", 179.8), bar("2023-08-09", 178.2)],
        )
        .unwrap()
    }

    fn prices() -> MockPriceSource {
        let mut prices = MockPriceSource::new();
        prices.expect_fetch_history().returning(|ticker, _| {
            if ticker.eq_ignore_ascii_case("AAPL") {
                Ok(aapl())
            } else {
                Err(StockError::NoData {
                    ticker: ticker.to_string(),
                })
            }
        });
        prices
    }

    fn crew_output(text: &str) -> CrewOutput {
        CrewOutput {
            final_output: text.to_string(),
            tasks_output: vec![TaskOutput {
                task: "write_analysis".to_string(),
                agent: "Senior Stock Analyst Writer".to_string(),
                description: String::new(),
                raw: text.to_string(),
            }],
            token_usage: TokenUsage::new(1200, 300),
            llm_calls: 3,
        }
    }

    fn service(prices: MockPriceSource, orchestrator: MockOrchestrator) -> ResearchService {
        ResearchService::new(Arc::new(prices), Arc::new(orchestrator))
    }

    fn request(tickers: &[&str]) -> ResearchRequest {
        ResearchRequest::new(tickers.iter().copied(), DateRange::default())
    }

    #[test]
    fn test_request_normalization() {
        let req = ResearchRequest::new([" aapl", "", "MSFT", "AAPL", "  "], DateRange::default());
        assert_eq!(req.tickers(), ["AAPL", "MSFT"]);

        let req = ResearchRequest::from_form(
            "nvda, tsla",
            &["TSLA".to_string(), "META".to_string()],
            DateRange::default(),
        );
        assert_eq!(req.tickers(), ["NVDA", "TSLA", "META"]);

        assert!(ResearchRequest::from_form(" ", &[], DateRange::default()).is_empty());
    }

    #[test]
    fn test_phase_transitions() {
        assert!(Phase::Idle.can_advance_to(Phase::AwaitingSubmission));
        assert!(Phase::Validating.can_advance_to(Phase::Rendering));
        assert!(Phase::Fetching.can_advance_to(Phase::Orchestrating));
        assert!(Phase::Rendering.can_advance_to(Phase::Idle));
        assert!(!Phase::Validating.can_advance_to(Phase::Orchestrating));
        assert!(!Phase::Idle.can_advance_to(Phase::Fetching));
    }

    #[tokio::test]
    async fn test_empty_selection_calls_nothing() {
        let mut prices = MockPriceSource::new();
        prices.expect_fetch_history().never();
        let mut orchestrator = MockOrchestrator::new();
        orchestrator.expect_run().never();

        let err = service(prices, orchestrator)
            .run(&request(&["", "  "]))
            .await
            .unwrap_err();

        assert!(matches!(err, StockError::EmptySelection));
        assert_eq!(err.to_string(), "Please fill the ticket field");
    }

    #[tokio::test]
    async fn test_single_ticker() {
        let mut orchestrator = MockOrchestrator::new();
        orchestrator
            .expect_run()
            .withf(|inputs| inputs.ticker() == Some("AAPL"))
            .times(1)
            .returning(|_| Ok(crew_output("# AAPL newsletter")));

        let report = service(prices(), orchestrator)
            .run(&request(&["AAPL"]))
            .await
            .unwrap();

        assert_eq!(report.tickers, vec!["AAPL"]);
        assert_eq!(report.chart_svg.matches("<polyline").count(), 1);
        assert!(report.chart_svg.contains(">AAPL</text>"));
        assert_eq!(report.report.as_deref(), Some("# AAPL newsletter"));
        assert!(report.report_error.is_none());
        assert!(report.failures.is_empty());
        assert_eq!(report.summaries[0].trading_days, 2);
        assert_eq!(
            report.phases,
            vec![
                Phase::AwaitingSubmission,
                Phase::Validating,
                Phase::Fetching,
                Phase::Orchestrating,
                Phase::Rendering,
                Phase::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_ticker_skips_orchestration() {
        let mut orchestrator = MockOrchestrator::new();
        orchestrator.expect_run().never();

        let err = service(prices(), orchestrator)
            .run(&request(&["ZZZZINVALID"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StockError::NoData { ref ticker } if ticker == "ZZZZINVALID"));
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn test_mixed_tickers_chart_only_valid() {
        let mut orchestrator = MockOrchestrator::new();
        orchestrator
            .expect_run()
            .withf(|inputs| inputs.ticker() == Some("AAPL"))
            .times(1)
            .returning(|_| Ok(crew_output("report")));

        let report = service(prices(), orchestrator)
            .run(&request(&["AAPL", "ZZZZINVALID"]))
            .await
            .unwrap();

        assert_eq!(report.tickers, vec!["AAPL"]);
        assert_eq!(report.chart_svg.matches("<polyline").count(), 1);
        assert!(!report.chart_svg.contains("ZZZZINVALID"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticker, "ZZZZINVALID");
        assert!(report.failures[0].error.contains("No price data"));
    }

    #[tokio::test]
    async fn test_all_failed_is_aggregate_error() {
        let mut orchestrator = MockOrchestrator::new();
        orchestrator.expect_run().never();

        let err = service(prices(), orchestrator)
            .run(&request(&["FOO", "BAR"]))
            .await
            .unwrap_err();

        match err {
            StockError::AllTickersFailed { tickers } => assert_eq!(tickers, vec!["FOO", "BAR"]),
            other => panic!("Expected AllTickersFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multi_ticker_kickoff_joins_tickers() {
        let mut prices = MockPriceSource::new();
        prices.expect_fetch_history().times(2).returning(|ticker, _| {
            PriceSeries::new(
                ticker.to_string(),
                vec![bar("2024-01-02", 10.0), bar("2024-01-03", 11.0)],
            )
        });

        let mut orchestrator = MockOrchestrator::new();
        orchestrator
            .expect_run()
            .withf(|inputs| {
                inputs.ticker() == Some("AAPL, MSFT")
                    && inputs.get_str("assets") == Some("AAPL, MSFT, BTC")
                    && inputs.datetime().is_some()
            })
            .times(1)
            .returning(|_| Ok(crew_output("comparison")));

        let report = service(prices, orchestrator)
            .run(&request(&["AAPL", "MSFT"]))
            .await
            .unwrap();

        assert_eq!(report.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(report.chart_svg.matches("<polyline").count(), 2);
    }

    struct PriceReadingOrchestrator {
        prices: Arc<HeldPrices>,
    }

    #[async_trait]
    impl Orchestrator for PriceReadingOrchestrator {
        async fn run(&self, inputs: &Inputs) -> Result<CrewOutput> {
            let ticker = inputs.ticker().unwrap_or_default();
            let series = self.prices.fetch_history(ticker, &DateRange::default()).await?;
            Ok(crew_output(&format!("{ticker}: {} bars", series.len())))
        }
    }

    #[tokio::test]
    async fn test_crew_reads_the_fetched_series() {
        let mut yahoo = MockPriceSource::new();
        yahoo.expect_fetch_history().times(1).returning(|_, _| Ok(aapl()));
        let held = Arc::new(HeldPrices::new(Arc::new(yahoo)));
        let orchestrator = PriceReadingOrchestrator {
            prices: Arc::clone(&held),
        };

        let report = ResearchService::with_held_prices(Arc::clone(&held), Arc::new(orchestrator))
            .run(&request(&["AAPL"]))
            .await
            .unwrap();

        assert_eq!(report.report.as_deref(), Some("AAPL: 2 bars"));
        assert_eq!(held.held_count().await, 0);
    }

    #[tokio::test]
    async fn test_crew_failure_is_reported_inline() {
        let mut orchestrator = MockOrchestrator::new();
        orchestrator.expect_run().times(1).returning(|_| {
            Err(StockError::Orchestration(CrewError::InvalidCrew(
                "provider unavailable".to_string(),
            )))
        });

        let report = service(prices(), orchestrator)
            .run(&request(&["AAPL"]))
            .await
            .unwrap();

        assert!(report.report.is_none());
        assert!(
            report
                .report_error
                .as_deref()
                .is_some_and(|e| e.contains("provider unavailable"))
        );
        assert_eq!(report.chart_svg.matches("<polyline").count(), 1);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = AppConfig::default();
        let err = ResearchService::from_config(&config, None).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_config_with_key() {
        let config = AppConfig::builder().openai_api_key("sk-test").build().unwrap();
        assert!(ResearchService::from_config(&config, None).is_ok());
    }
}
