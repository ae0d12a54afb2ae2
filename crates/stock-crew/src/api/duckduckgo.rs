//! DuckDuckGo search client
//!
//! Two backends: `News` resolves a `vqd` token from the landing page and then
//! queries `news.js`; `Text` scrapes the no-JavaScript HTML endpoint.

use crate::error::{Result, StockError};
use crate::model::NewsItem;
use async_trait::async_trait;
use chrono::DateTime;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const LANDING_URL: &str = "https://duckduckgo.com";
const HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) stock-crew/0.1";
const REGION: &str = "us-en";

/// Which DuckDuckGo index to query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchBackend {
    #[default]
    News,
    Text,
}

impl std::str::FromStr for SearchBackend {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Ok(Self::News),
            "text" | "html" => Ok(Self::Text),
            other => Err(StockError::Config(format!("unknown search backend '{other}'"))),
        }
    }
}

/// Web/news search used by the news analyst
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSearch: Send + Sync {
    /// Hits in provider rank order, at most `max_results`
    async fn search(
        &self,
        query: &str,
        backend: SearchBackend,
        max_results: usize,
    ) -> Result<Vec<NewsItem>>;
}

#[derive(Clone)]
pub struct DuckDuckGoClient {
    client: Client,
    rate_limiter: SharedRateLimiter,
    vqd: Regex,
    landing_url: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    #[serde(default)]
    date: Option<i64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    source: String,
}

impl DuckDuckGoClient {
    /// Create a client allowing `rate_per_minute` requests
    pub fn new(timeout: Duration, rate_per_minute: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StockError::Config(format!("Failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(NonZeroU32::new(rate_per_minute).unwrap_or(NonZeroU32::MIN));
        let vqd = Regex::new(r#"vqd=["']?([0-9-]+)"#)
            .map_err(|e| StockError::Config(format!("invalid vqd pattern: {e}")))?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            vqd,
            landing_url: LANDING_URL.to_string(),
            html_url: HTML_URL.to_string(),
        })
    }

    /// Point both backends at another host, e.g. a local stub
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        self.html_url = format!("{base}/html/");
        self.landing_url = base;
        self
    }

    async fn vqd_token(&self, query: &str) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let page = self
            .client
            .get(&self.landing_url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| StockError::Search(format!("token request failed: {e}")))?
            .text()
            .await
            .map_err(|e| StockError::Search(format!("token page unreadable: {e}")))?;

        extract_vqd(&self.vqd, &page)
            .ok_or_else(|| StockError::Search(format!("no vqd token for query '{query}'")))
    }

    async fn search_news(&self, query: &str, max_results: usize) -> Result<Vec<NewsItem>> {
        let vqd = self.vqd_token(query).await?;
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(format!("{}/news.js", self.landing_url))
            .query(&[
                ("l", REGION),
                ("o", "json"),
                ("noamp", "1"),
                ("q", query),
                ("vqd", vqd.as_str()),
                ("p", "-1"),
            ])
            .send()
            .await
            .map_err(|e| StockError::Search(format!("news request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(StockError::Search(format!(
                "news search returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StockError::Search(format!("news response unreadable: {e}")))?;

        parse_news(&body, max_results)
    }

    async fn search_text(&self, query: &str, max_results: usize) -> Result<Vec<NewsItem>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .post(&self.html_url)
            .form(&[("q", query), ("kl", REGION)])
            .send()
            .await
            .map_err(|e| StockError::Search(format!("text request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(StockError::Search(format!(
                "text search returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StockError::Search(format!("text response unreadable: {e}")))?;

        parse_html_results(&body, max_results)
    }
}

#[async_trait]
impl NewsSearch for DuckDuckGoClient {
    async fn search(
        &self,
        query: &str,
        backend: SearchBackend,
        max_results: usize,
    ) -> Result<Vec<NewsItem>> {
        tracing::debug!(query, ?backend, max_results, "Searching DuckDuckGo");

        let items = match backend {
            SearchBackend::News => self.search_news(query, max_results).await,
            SearchBackend::Text => self.search_text(query, max_results).await,
        };

        match &items {
            Ok(items) => tracing::info!(query, hits = items.len(), "Search complete"),
            Err(e) => tracing::warn!(query, error = %e, "Search failed"),
        }
        items
    }
}

fn extract_vqd(pattern: &Regex, page: &str) -> Option<String> {
    pattern
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_news(body: &str, max_results: usize) -> Result<Vec<NewsItem>> {
    let response: NewsResponse = serde_json::from_str(body)
        .map_err(|e| StockError::Search(format!("invalid news response: {e}")))?;

    Ok(response
        .results
        .into_iter()
        .take(max_results)
        .map(|r| NewsItem {
            title: r.title,
            snippet: r.excerpt,
            source: r.source,
            date: r.date.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            url: r.url,
        })
        .collect())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| StockError::Search(format!("invalid selector '{css}': {e:?}")))
}

fn parse_html_results(body: &str, max_results: usize) -> Result<Vec<NewsItem>> {
    let result_sel = selector("div.result")?;
    let title_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;
    let url_sel = selector(".result__url")?;

    let document = Html::parse_document(body);
    let items = document
        .select(&result_sel)
        .filter(|r| !r.value().classes().any(|c| c == "result--ad"))
        .filter_map(|r| {
            let link = r.select(&title_sel).next()?;
            let href = link.value().attr("href")?;
            Some(NewsItem {
                title: text(link),
                snippet: r.select(&snippet_sel).next().map(text).unwrap_or_default(),
                source: r.select(&url_sel).next().map(text).unwrap_or_default(),
                date: None,
                url: resolve_link(href),
            })
        })
        .take(max_results)
        .collect();

    Ok(items)
}

fn text(el: scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Unwrap `//duckduckgo.com/l/?uddg=<target>` redirect links
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    url::Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_stub;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};

    const LANDING_PAGE: &str = "<script>nrje('/d.js?q=AAPL&vqd=4-111-222&kl=wt-wt')</script>";

    async fn stub_client(router: Router) -> DuckDuckGoClient {
        DuckDuckGoClient::new(Duration::from_secs(5), 20)
            .unwrap()
            .with_base_url(serve_stub(router).await)
    }

    #[test]
    fn test_extract_vqd() {
        let pattern = Regex::new(r#"vqd=["']?([0-9-]+)"#).unwrap();
        let page = r#"<script>DDG.deep.initialize('/d.js?q=AAPL&vqd="4-1234567890-98765"&p=1');</script>"#;
        assert_eq!(extract_vqd(&pattern, page).as_deref(), Some("4-1234567890-98765"));

        let bare = "nrje('/d.js?q=AAPL&vqd=4-111-222&kl=wt-wt')";
        assert_eq!(extract_vqd(&pattern, bare).as_deref(), Some("4-111-222"));

        assert_eq!(extract_vqd(&pattern, "<html></html>"), None);
    }

    #[test]
    fn test_parse_news_keeps_rank_order_and_truncates() {
        let body = r#"{"results":[
            {"date":1723046400,"title":"Apple beats estimates","excerpt":"Revenue up","url":"https://a.example/1","source":"Reuters"},
            {"date":1723050000,"title":"Bitcoin slides","excerpt":"Crypto down","url":"https://b.example/2","source":"CoinDesk"},
            {"title":"No date","excerpt":"","url":"https://c.example/3","source":"Blog"}
        ]}"#;

        let items = parse_news(body, 2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Apple beats estimates");
        assert_eq!(items[0].snippet, "Revenue up");
        assert_eq!(items[0].source, "Reuters");
        assert_eq!(
            items[0].date.map(|d| d.to_rfc3339()),
            Some("2024-08-07T16:00:00+00:00".to_string())
        );
        assert_eq!(items[1].title, "Bitcoin slides");

        let all = parse_news(body, 10).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[2].date.is_none());
    }

    #[test]
    fn test_parse_news_rejects_garbage() {
        assert!(matches!(parse_news("not json", 10), Err(StockError::Search(_))));
        assert!(parse_news("{}", 10).unwrap().is_empty());
    }

    #[test]
    fn test_parse_html_results() {
        let body = r##"
            <div class="result results_links result--ad">
              <a class="result__a" href="https://ads.example">Sponsored</a>
            </div>
            <div class="result results_links">
              <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnews.example%2Faapl&amp;rut=abc">Apple <b>stock</b> rallies</a></h2>
              <a class="result__url" href="#"> news.example/aapl </a>
              <a class="result__snippet" href="#">Shares rose 3%.</a>
            </div>
            <div class="result results_links">
              <a class="result__a" href="https://direct.example/btc">BTC outlook</a>
            </div>
        "##;

        let items = parse_html_results(body, 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Apple stock rallies");
        assert_eq!(items[0].url, "https://news.example/aapl");
        assert_eq!(items[0].source, "news.example/aapl");
        assert_eq!(items[0].snippet, "Shares rose 3%.");
        assert_eq!(items[1].url, "https://direct.example/btc");
        assert!(items[1].snippet.is_empty());

        assert_eq!(parse_html_results(body, 1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_news_backend_over_http() {
        let router = Router::new()
            .route("/", get(|| async { LANDING_PAGE }))
            .route(
                "/news.js",
                get(|| async {
                    r#"{"results":[
                        {"title":"Apple beats estimates","excerpt":"Revenue up","url":"https://a.example/1","source":"Reuters"},
                        {"title":"Bitcoin slides","excerpt":"","url":"https://b.example/2","source":"CoinDesk"}
                    ]}"#
                }),
            );
        let client = stub_client(router).await;

        let items = client.search("AAPL", SearchBackend::News, 1).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Apple beats estimates");
    }

    #[tokio::test]
    async fn test_news_http_error_is_search_error() {
        let router = Router::new()
            .route("/", get(|| async { LANDING_PAGE }))
            .route(
                "/news.js",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            );
        let client = stub_client(router).await;

        let err = client
            .search("AAPL", SearchBackend::News, 5)
            .await
            .unwrap_err();
        match err {
            StockError::Search(reason) => assert!(reason.contains("503")),
            other => panic!("Expected Search, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_search_error() {
        let client = stub_client(Router::new().route("/", get(|| async { "<html></html>" }))).await;
        let err = client
            .search("AAPL", SearchBackend::News, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Search(ref reason) if reason.contains("vqd")));
    }

    #[tokio::test]
    async fn test_text_backend_over_http() {
        let router = Router::new().route(
            "/html/",
            post(|| async {
                r#"<div class="result results_links">
                     <a class="result__a" href="https://direct.example/btc">BTC outlook</a>
                   </div>"#
            }),
        );
        let client = stub_client(router).await;

        let items = client.search("BTC", SearchBackend::Text, 5).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://direct.example/btc");
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("news".parse::<SearchBackend>().unwrap(), SearchBackend::News);
        assert_eq!("Text".parse::<SearchBackend>().unwrap(), SearchBackend::Text);
        assert!("images".parse::<SearchBackend>().is_err());
        assert_eq!(SearchBackend::default(), SearchBackend::News);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_news_search() {
        let client = DuckDuckGoClient::new(Duration::from_secs(30), 20).unwrap();
        let items = client
            .search("AAPL stock", SearchBackend::News, 5)
            .await
            .unwrap();
        assert!(items.len() <= 5);
    }
}
