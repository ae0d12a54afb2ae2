//! Error types for stock research

use thiserror::Error;

/// Errors raised while researching tickers
#[derive(Debug, Error)]
pub enum StockError {
    /// Missing credential or unparseable setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blank or malformed ticker, rejected before any request
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// The provider has no rows for this ticker in the range
    #[error("No price data found for {ticker} in the requested range")]
    NoData { ticker: String },

    /// Transport, status or parse failure talking to the price provider
    #[error("Failed to fetch prices for {ticker}: {reason}")]
    Fetch { ticker: String, reason: String },

    /// DuckDuckGo token, transport, status or parse failure
    #[error("News search failed: {0}")]
    Search(String),

    /// Submission with no ticker after normalisation
    #[error("Please fill the ticket field")]
    EmptySelection,

    /// Every ticker of a multi-ticker submission failed to fetch
    #[error("No price data for any selected ticker: {}", .tickers.join(", "))]
    AllTickersFailed { tickers: Vec<String> },

    /// A crew stage failed or the crew could not be built
    #[error("Research crew failed: {0}")]
    Orchestration(#[from] crew_runtime::CrewError),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    /// Errors caused by what the user submitted rather than by a provider
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::EmptySelection
                | Self::InvalidSymbol(_)
                | Self::NoData { .. }
                | Self::AllTickersFailed { .. }
        )
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Tool failures reach the model as text
impl From<StockError> for crew_core::Error {
    fn from(err: StockError) -> Self {
        crew_core::Error::ProcessingFailed(err.to_string())
    }
}

impl From<crew_utils::ConfigError> for StockError {
    fn from(err: crew_utils::ConfigError) -> Self {
        StockError::Config(err.to_string())
    }
}

impl From<crew_llm::LLMError> for StockError {
    fn from(err: crew_llm::LLMError) -> Self {
        StockError::Config(err.to_string())
    }
}
