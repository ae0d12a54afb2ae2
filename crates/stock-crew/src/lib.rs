//! Stock research crew
//!
//! Fetches a year of daily prices from Yahoo Finance, charts them, and runs a
//! three-agent crew (price analyst, news analyst, writer) that produces a
//! markdown newsletter. Served as a web dashboard or from the command line.
//!
//! ```no_run
//! use stock_crew::{AppConfig, ResearchRequest, ResearchService};
//!
//! # async fn run() -> Result<(), stock_crew::StockError> {
//! let config = AppConfig::from_env()?;
//! let service = ResearchService::from_config(&config, None)?;
//!
//! let request = ResearchRequest::new(["AAPL"], config.date_range);
//! let report = service.run(&request).await?;
//! println!("{}", report.report.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chart;
pub mod config;
pub mod crew;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod research;
pub mod tools;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use error::{Result, StockError};
pub use model::{DateRange, NewsItem, PriceBar, PriceSeries};
pub use research::{
    CrewOrchestrator, Orchestrator, Phase, ResearchReport, ResearchRequest, ResearchService,
};
