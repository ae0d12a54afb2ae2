//! The stock research crew: three agents, three tasks
//!
//! A price analyst calls the Yahoo Finance tool and calls the trend, a news
//! analyst searches headlines for the ticker and BTC and scores fear/greed,
//! and a writer turns both outputs into a markdown newsletter.

use crate::api::{NewsSearch, PriceSource};
use crate::config::AppConfig;
use crate::error::Result;
use crate::tools::{NewsSearchTool, StockPriceTool, news_search, stock_price};
use chrono::{DateTime, TimeZone};
use crew_core::Inputs;
use crew_llm::LLMProvider;
use crew_runtime::{AgentSpec, Crew, CrewEventHandler, TaskSpec};
use crew_tools::ToolRegistry;
use serde_json::json;
use std::sync::Arc;

pub const PRICE_ANALYST: &str = "Senior stock price Analyst";
pub const NEWS_ANALYST: &str = "Stock News Analyst";
pub const WRITER: &str = "Senior Stock Analyst Writer";

pub const GET_STOCK_PRICE: &str = "get_stock_price";
pub const GET_NEWS: &str = "get_news";
pub const WRITE_ANALYSIS: &str = "write_analysis";

/// Asset always covered by the news stage
pub const ALWAYS_INCLUDED_ASSET: &str = "BTC";

/// Template key holding the comma-separated news assets
pub const ASSETS_KEY: &str = "assets";

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn price_analyst() -> AgentSpec {
    AgentSpec::new(
        PRICE_ANALYST,
        "Find the {{ ticker }} stock price and analyses trends",
        "You're highly experienced in analyzing the price of a specific stock \
         and make predictions about its future price.",
    )
    .with_max_iter(5)
    .with_memory(true)
    .with_tool(stock_price::TOOL_NAME)
    .with_delegation(false)
}

pub fn news_analyst() -> AgentSpec {
    AgentSpec::new(
        NEWS_ANALYST,
        "Create a short summary of the market news related to the stock {{ ticker }} company. \
         Specify the current trend - up, down or sideways with the news context. \
         For each request stock asset, specify a number between 0 and 100, where 0 is \
         extreme fear and 100 is extreme greed.",
        "You're highly experienced in analyzing the market trends and news and have tracked \
         assets for more than 10 years.\n\n\
         You're also master level analyst in the traditional markets and have deep \
         understanding of human psychology.\n\n\
         You understand news, their titles and information, but you look at these with a \
         healthy dose of skepticism. You consider also the source of the news articles.",
    )
    .with_max_iter(10)
    .with_memory(true)
    .with_tool(news_search::TOOL_NAME)
    .with_delegation(false)
}

pub fn writer() -> AgentSpec {
    AgentSpec::new(
        WRITER,
        "Analyze the trends price and news and write an insightful, compelling and \
         informative 3 paragraph long newsletter based on the stock",
        "You're widely accepted as the best stock analyst in the market. You understand \
         complex concepts and create compelling stories and narratives that resonate with \
         wider audiences. You understand macro factors and combine multiple theories - eg, \
         cycle theory and fundamental analyses. You're able to hold multiple opinions when \
         analyzing anything.",
    )
    .with_max_iter(5)
    .with_memory(true)
    .with_delegation(true)
}

pub fn get_stock_price_task() -> TaskSpec {
    TaskSpec::new(
        GET_STOCK_PRICE,
        "Analyze the stock {{ ticker }} price history and create a trend analysis of up, \
         down or sideways",
        "Specify the current trend stock price - up, down or sideways.\n\
         eg. stock= 'AAPL, price UP'",
        PRICE_ANALYST,
    )
}

pub fn get_news_task() -> TaskSpec {
    TaskSpec::new(
        GET_NEWS,
        "Take the stock and always include BTC to it (if not requested).\n\
         The assets to cover are: {{ assets }}.\n\
         Use the search tool to search each one individually.\n\n\
         The current date is {{ datetime }}\n\n\
         Compose the results into a helpful report",
        "A summary of the overall market and one sentence summary for each request asset.\n\
         Include a fear/greed score for each asset based on the news. Use format:\n\
         <STOCK ASSET>\n\
         <SUMMARY BASED ON NEWS>\n\
         <TREND PREDICTION>\n\
         <FEAR/GREED SCORE>",
        NEWS_ANALYST,
    )
}

pub fn write_analysis_task() -> TaskSpec {
    TaskSpec::new(
        WRITE_ANALYSIS,
        "Use the stock price trend and the stock news report to create an analysis and \
         write the newsletter about the {{ ticker }} company that is brief and highlights \
         the most important points.\n\
         Focus on the stock price trend, news, and fear/greed score. What are the near \
         future considerations? Include the previous analyses of stock trend and news summary.",
        "An eloquent 3 paragraphs newsletter formatted as markdown in an easy readable \
         manner. It should contain:\n\
         - 3 bullets executive summary\n\
         - Introduction - set the overall picture and spike up the interest\n\
         - main part provides the meat of the analysis including the news summary and \
         fear/greed scores\n\
         - summary - key facts and concrete future trend prediction - up, down or sideways.",
        WRITER,
    )
    .with_context(GET_STOCK_PRICE)
    .with_context(GET_NEWS)
}

/// Assets for the news stage: the requested tickers plus BTC
pub fn news_assets(tickers: &[String]) -> Vec<String> {
    let mut assets: Vec<String> = tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();

    let has_btc = assets
        .iter()
        .any(|t| t == ALWAYS_INCLUDED_ASSET || t.starts_with("BTC-"));
    if !has_btc {
        assets.push(ALWAYS_INCLUDED_ASSET.to_string());
    }
    assets
}

/// Kickoff inputs for one submission
///
/// `ticker` is the tickers joined with `", "`; `datetime` is `now` in
/// `%Y-%m-%d %H:%M:%S`.
pub fn kickoff_inputs<Tz>(tickers: &[String], now: &DateTime<Tz>) -> Inputs
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    Inputs::new()
        .with_ticker(tickers.join(", "))
        .with_datetime(now.format(DATETIME_FORMAT).to_string())
        .with(ASSETS_KEY, json!(news_assets(tickers).join(", ")))
}

/// Assemble the crew around the given provider and data sources
pub fn build_stock_crew(
    provider: Arc<dyn LLMProvider>,
    prices: Arc<dyn PriceSource>,
    news: Arc<dyn NewsSearch>,
    config: &AppConfig,
    events: Option<Arc<dyn CrewEventHandler>>,
) -> Result<Crew> {
    let tools = ToolRegistry::new()
        .with(Arc::new(StockPriceTool::new(prices, config.date_range)))
        .with(Arc::new(
            NewsSearchTool::new(news, config.news_max_results).with_backend(config.news_backend),
        ));

    let mut builder = Crew::builder()
        .provider(provider)
        .model(&config.model)
        .max_iter(config.crew_max_iter)
        .tools(tools)
        .agent(price_analyst())
        .agent(news_analyst())
        .agent(writer())
        .task(get_stock_price_task())
        .task(get_news_task())
        .task(write_analysis_task());

    if let Some(events) = events {
        builder = builder.event_handler(events);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockNewsSearch, MockPriceSource, SearchBackend};
    use crate::error::StockError;
    use crate::model::{PriceSeries, bar};
    use crate::research::{CrewOrchestrator, Orchestrator};
    use crate::testing::{ScriptedProvider, transcript};
    use crew_runtime::CrewError;
    use chrono::{NaiveDate, Utc};

    fn tickers(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn crew_with(
        provider: Arc<ScriptedProvider>,
        prices: MockPriceSource,
        news: MockNewsSearch,
    ) -> Crew {
        build_stock_crew(
            provider,
            Arc::new(prices),
            Arc::new(news),
            &AppConfig::default(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_news_assets_always_include_btc() {
        assert_eq!(news_assets(&tickers(&["AAPL"])), vec!["AAPL", "BTC"]);
        assert_eq!(
            news_assets(&tickers(&["aapl", "MSFT"])),
            vec!["AAPL", "MSFT", "BTC"]
        );
        assert_eq!(news_assets(&tickers(&["BTC", "AAPL"])), vec!["BTC", "AAPL"]);
        assert_eq!(news_assets(&tickers(&["BTC-USD"])), vec!["BTC-USD"]);
    }

    #[test]
    fn test_kickoff_inputs() {
        let now = NaiveDate::from_ymd_opt(2024, 8, 8)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            .and_utc();
        let inputs = kickoff_inputs(&tickers(&["AAPL", "MSFT"]), &now);

        assert_eq!(inputs.ticker(), Some("AAPL, MSFT"));
        assert_eq!(inputs.datetime(), Some("2024-08-08 09:30:00"));
        assert_eq!(inputs.get_str(ASSETS_KEY), Some("AAPL, MSFT, BTC"));
    }

    #[test]
    fn test_crew_shape() {
        let crew = crew_with(
            Arc::new(ScriptedProvider::new()),
            MockPriceSource::new(),
            MockNewsSearch::new(),
        );

        let roles: Vec<&str> = crew.agents().iter().map(|a| a.role.as_str()).collect();
        assert_eq!(roles, vec![PRICE_ANALYST, NEWS_ANALYST, WRITER]);

        let caps: Vec<usize> = crew.agents().iter().map(|a| a.max_iter).collect();
        assert_eq!(caps, vec![5, 10, 5]);
        assert!(crew.agents().iter().all(|a| a.memory));
        assert!(crew.agents()[2].allow_delegation);
        assert!(crew.agents()[2].tools.is_empty());

        let names: Vec<&str> = crew.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![GET_STOCK_PRICE, GET_NEWS, WRITE_ANALYSIS]);
        assert!(crew.tasks()[0].context.is_empty());
        assert!(crew.tasks()[1].context.is_empty());
        assert_eq!(crew.tasks()[2].context, vec![GET_STOCK_PRICE, GET_NEWS]);
        assert_eq!(crew.model(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_kickoff_threads_outputs_into_newsletter() {
        let series = PriceSeries::new(
            "AAPL",
            vec![bar("2024-08-06", 207.2), bar("2024-08-07", 209.8)],
        )
        .unwrap();

        let mut prices = MockPriceSource::new();
        prices
            .expect_fetch_history()
            .times(1)
            .returning(move |_, _| Ok(series.clone()));

        let mut news = MockNewsSearch::new();
        news.expect_search().times(2).returning(|_, _, _| Ok(vec![]));

        let provider = Arc::new(
            ScriptedProvider::new()
                .tool_call("c1", stock_price::TOOL_NAME, json!({ "ticker": "AAPL" }))
                .text("stock= 'AAPL, price UP'")
                .tool_call("c2", news_search::TOOL_NAME, json!({ "query": "AAPL news" }))
                .tool_call("c3", news_search::TOOL_NAME, json!({ "query": "BTC news" }))
                .text("AAPL greed 70; BTC fear 30")
                .text("# AAPL newsletter"),
        );

        let crew = crew_with(Arc::clone(&provider), prices, news);
        let now = Utc::now();
        let output = crew
            .kickoff(&kickoff_inputs(&tickers(&["AAPL"]), &now))
            .await
            .unwrap();

        assert_eq!(output.final_output, "# AAPL newsletter");
        assert_eq!(output.tasks_output.len(), 3);
        assert_eq!(output.llm_calls, 6);

        let requests = provider.requests();
        assert_eq!(requests.len(), 6);

        let first = transcript(&requests[0]);
        assert!(first.contains("You are Senior stock price Analyst."));
        assert!(first.contains("Analyze the stock AAPL price history"));

        // The tool result reaches the model on the next call
        assert!(transcript(&requests[1]).contains("209.8"));

        assert!(transcript(&requests[2]).contains("The assets to cover are: AAPL, BTC."));

        let last = transcript(&requests[5]);
        assert!(last.contains("stock= 'AAPL, price UP'"));
        assert!(last.contains("AAPL greed 70; BTC fear 30"));
        assert!(last.contains("### Output of 'get_news' (Stock News Analyst)"));
        assert!(requests[5].tools.is_none());
    }

    #[tokio::test]
    async fn test_configured_backend_reaches_search() {
        let mut news = MockNewsSearch::new();
        news.expect_search()
            .withf(|_, backend, max| *backend == SearchBackend::Text && *max == 4)
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let provider = Arc::new(
            ScriptedProvider::new()
                .text("stock= 'AAPL, price FLAT'")
                .tool_call("n1", news_search::TOOL_NAME, json!({ "query": "AAPL news" }))
                .text("no headlines")
                .text("# AAPL newsletter"),
        );

        let config = AppConfig::builder()
            .news_backend(SearchBackend::Text)
            .news_max_results(4)
            .build()
            .unwrap();
        let crew = build_stock_crew(
            provider,
            Arc::new(MockPriceSource::new()),
            Arc::new(news),
            &config,
            None,
        )
        .unwrap();

        let output = crew
            .kickoff(&kickoff_inputs(&tickers(&["AAPL"]), &Utc::now()))
            .await
            .unwrap();
        assert_eq!(output.final_output, "# AAPL newsletter");
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_kickoff() {
        let provider =
            Arc::new(ScriptedProvider::new().error(crew_llm::LLMError::AuthenticationFailed));

        let mut prices = MockPriceSource::new();
        prices.expect_fetch_history().never();
        let mut news = MockNewsSearch::new();
        news.expect_search().never();

        let orchestrator = CrewOrchestrator::new(crew_with(Arc::clone(&provider), prices, news));
        let err = orchestrator
            .run(&kickoff_inputs(&tickers(&["AAPL"]), &Utc::now()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StockError::Orchestration(CrewError::TaskFailed { ref task, .. }) if task == GET_STOCK_PRICE
        ));
        // Later stages never start
        assert_eq!(provider.requests().len(), 1);
    }
}
