//! Application configuration
//!
//! Loaded once at startup from the environment (after `.env`), or built
//! directly in tests. A missing `OPENAI_API_KEY` does not fail loading; the
//! CLI refuses to run and the dashboard shows a banner instead.

use crate::api::SearchBackend;
use crate::error::{Result, StockError};
use crate::model::DateRange;
use crew_utils::{env_list, env_parse, env_var};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_NEWS_MAX_RESULTS: usize = 10;
pub const DEFAULT_NEWS_RATE_PER_MINUTE: u32 = 20;
pub const DEFAULT_CREW_MAX_ITER: usize = 15;
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_ADDR: &str = "127.0.0.1:8501";
const DEFAULT_TICKERS: [&str; 8] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "BTC-USD",
];

/// Settings for the research service, the dashboard and the CLI
#[derive(Clone)]
pub struct AppConfig {
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible base URL; the provider default when unset
    pub openai_api_base: Option<String>,
    pub model: String,
    pub date_range: DateRange,
    /// Options offered by the dashboard multi-select
    pub tickers: Vec<String>,
    pub news_max_results: usize,
    pub news_rate_per_minute: u32,
    /// DuckDuckGo index the news analyst searches
    pub news_backend: SearchBackend,
    pub http_timeout: Duration,
    pub crew_max_iter: usize,
    pub addr: SocketAddr,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("openai_api_base", &self.openai_api_base)
            .field("model", &self.model)
            .field("date_range", &self.date_range)
            .field("tickers", &self.tickers)
            .field("news_max_results", &self.news_max_results)
            .field("news_rate_per_minute", &self.news_rate_per_minute)
            .field("news_backend", &self.news_backend)
            .field("http_timeout", &self.http_timeout)
            .field("crew_max_iter", &self.crew_max_iter)
            .field("addr", &self.addr)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_api_base: None,
            model: DEFAULT_MODEL.to_string(),
            date_range: DateRange::default(),
            tickers: DEFAULT_TICKERS.iter().map(ToString::to_string).collect(),
            news_max_results: DEFAULT_NEWS_MAX_RESULTS,
            news_rate_per_minute: DEFAULT_NEWS_RATE_PER_MINUTE,
            news_backend: SearchBackend::default(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            crew_max_iter: DEFAULT_CREW_MAX_ITER,
            addr: SocketAddr::from(([127, 0, 0, 1], 8501)),
        }
    }
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Read every setting from the environment
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(key) = env_var("OPENAI_API_KEY") {
            builder = builder.openai_api_key(key);
        }
        if let Some(base) = env_var("OPENAI_API_BASE") {
            builder = builder.openai_api_base(base);
        }
        if let Some(model) = env_var("OPENAI_MODEL") {
            builder = builder.model(model);
        }

        let defaults = DateRange::default();
        let start = env_var("STOCK_CREW_START").unwrap_or_else(|| defaults.start.to_string());
        let end = env_var("STOCK_CREW_END").unwrap_or_else(|| defaults.end.to_string());
        builder = builder.date_range(DateRange::parse(&start, &end)?);

        if let Some(tickers) = env_list("STOCK_CREW_TICKERS") {
            builder = builder.tickers(tickers);
        }
        if let Some(n) = env_parse::<usize>("NEWS_MAX_RESULTS")? {
            builder = builder.news_max_results(n);
        }
        if let Some(n) = env_parse::<u32>("NEWS_RATE_PER_MINUTE")? {
            builder = builder.news_rate_per_minute(n);
        }
        if let Some(backend) = env_var("NEWS_BACKEND") {
            builder = builder.news_backend(backend.parse()?);
        }
        if let Some(secs) = env_parse::<u64>("HTTP_TIMEOUT_SECS")? {
            builder = builder.http_timeout(Duration::from_secs(secs));
        }
        let addr = env_var("STOCK_CREW_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        builder = builder.addr(
            addr.parse()
                .map_err(|e| StockError::Config(format!("STOCK_CREW_ADDR '{addr}': {e}")))?,
        );

        builder.build()
    }

    /// The API key, or the configuration error users see
    pub fn require_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| StockError::Config("OPENAI_API_KEY is not set".to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StockError::Config("model name is empty".to_string()));
        }
        if self.news_max_results == 0 {
            return Err(StockError::Config(
                "NEWS_MAX_RESULTS must be greater than 0".to_string(),
            ));
        }
        if self.news_rate_per_minute == 0 {
            return Err(StockError::Config(
                "NEWS_RATE_PER_MINUTE must be greater than 0".to_string(),
            ));
        }
        if self.http_timeout.is_zero() {
            return Err(StockError::Config(
                "HTTP_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.crew_max_iter == 0 {
            return Err(StockError::Config("crew max_iter must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`AppConfig`]
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    openai_api_key: Option<String>,
    openai_api_base: Option<String>,
    model: Option<String>,
    date_range: Option<DateRange>,
    tickers: Option<Vec<String>>,
    news_max_results: Option<usize>,
    news_rate_per_minute: Option<u32>,
    news_backend: Option<SearchBackend>,
    http_timeout: Option<Duration>,
    crew_max_iter: Option<usize>,
    addr: Option<SocketAddr>,
}

impl AppConfigBuilder {
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn openai_api_base(mut self, base: impl Into<String>) -> Self {
        self.openai_api_base = Some(base.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Dashboard options; normalised to upper case, blanks dropped
    pub fn tickers(mut self, tickers: Vec<String>) -> Self {
        self.tickers = Some(tickers);
        self
    }

    pub fn news_max_results(mut self, n: usize) -> Self {
        self.news_max_results = Some(n);
        self
    }

    pub fn news_rate_per_minute(mut self, n: u32) -> Self {
        self.news_rate_per_minute = Some(n);
        self
    }

    pub fn news_backend(mut self, backend: SearchBackend) -> Self {
        self.news_backend = Some(backend);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn crew_max_iter(mut self, n: usize) -> Self {
        self.crew_max_iter = Some(n);
        self
    }

    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    pub fn build(self) -> Result<AppConfig> {
        let defaults = AppConfig::default();

        let tickers = self.tickers.map_or(defaults.tickers, |list| {
            list.into_iter()
                .map(|t| t.trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect()
        });

        let config = AppConfig {
            openai_api_key: self.openai_api_key.filter(|k| !k.trim().is_empty()),
            openai_api_base: self.openai_api_base,
            model: self.model.unwrap_or(defaults.model),
            date_range: self.date_range.unwrap_or(defaults.date_range),
            tickers,
            news_max_results: self.news_max_results.unwrap_or(defaults.news_max_results),
            news_rate_per_minute: self
                .news_rate_per_minute
                .unwrap_or(defaults.news_rate_per_minute),
            news_backend: self.news_backend.unwrap_or(defaults.news_backend),
            http_timeout: self.http_timeout.unwrap_or(defaults.http_timeout),
            crew_max_iter: self.crew_max_iter.unwrap_or(defaults.crew_max_iter),
            addr: self.addr.unwrap_or(defaults.addr),
        };

        config.validate()?;
        Ok(config)
    }
}
