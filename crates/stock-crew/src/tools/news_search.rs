//! `News Search`: recent headlines from DuckDuckGo News

use crate::api::{NewsSearch, SearchBackend};
use async_trait::async_trait;
use crew_core::Result as CrewResult;
use crew_llm::tools::schema;
use crew_tools::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub const TOOL_NAME: &str = "News Search";

pub struct NewsSearchTool {
    search: Arc<dyn NewsSearch>,
    backend: SearchBackend,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct NewsSearchParams {
    #[serde(alias = "q", alias = "search_query")]
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

impl NewsSearchTool {
    /// `max_results` is the default and the upper bound per call
    pub fn new(search: Arc<dyn NewsSearch>, max_results: usize) -> Self {
        Self {
            search,
            backend: SearchBackend::News,
            max_results,
        }
    }

    pub fn with_backend(mut self, backend: SearchBackend) -> Self {
        self.backend = backend;
        self
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    async fn execute(&self, params: Value) -> CrewResult<Value> {
        let params: NewsSearchParams = serde_json::from_value(params).map_err(|e| {
            crew_core::Error::InvalidInput(format!("Invalid parameters: {e}"))
        })?;

        let query = params.query.trim();
        if query.is_empty() {
            return Err(crew_core::Error::InvalidInput("query must not be empty".to_string()));
        }

        let limit = params
            .max_results
            .map_or(self.max_results, |n| n.clamp(1, self.max_results));

        let items = self.search.search(query, self.backend, limit).await?;

        Ok(json!({
            "query": query,
            "count": items.len(),
            "results": items,
        }))
    }

    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches recent news articles. Search one stock or asset per call, \
         e.g. 'AAPL stock news' or 'BTC news'. Returns title, snippet, source, \
         date and link for each article."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "query": schema::string("Search query"),
                "max_results": schema::integer("Maximum number of articles to return"),
            }),
            &["query"],
        )
    }
}
