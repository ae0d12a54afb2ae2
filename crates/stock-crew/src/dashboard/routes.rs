//! Dashboard and JSON API handlers

use super::state::AppState;
use super::templates::{PageView, render_index};
use crate::error::StockError;
use crate::research::{ResearchReport, ResearchRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/research", post(research))
        .route("/api/research", post(api_research))
        .route("/health", get(health))
}

/// Errors that escape a handler
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Research(#[from] StockError),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DashboardError::Research(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            DashboardError::Research(e) if e.is_config() => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::Research(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn page(state: &AppState, view: &PageView<'_>) -> Result<Html<String>, DashboardError> {
    let html = render_index(
        &state.templates,
        &state.config.tickers,
        &state.config.date_range.to_string(),
        state.config_error.as_deref(),
        view,
    )?;
    Ok(Html(html))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, DashboardError> {
    page(&state, &PageView::default())
}

/// `ticker` is the free-text field; `tickers` repeats once per selected option
fn parse_form(body: &str) -> (String, Vec<String>) {
    let mut ticker = String::new();
    let mut selected = Vec::new();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        match key.as_ref() {
            "ticker" => ticker = value.into_owned(),
            "tickers" => selected.push(value.into_owned()),
            _ => {}
        }
    }
    (ticker, selected)
}

async fn research(
    State(state): State<AppState>,
    body: String,
) -> Result<Html<String>, DashboardError> {
    let (ticker, selected) = parse_form(&body);
    let mut view = PageView {
        ticker: &ticker,
        selected: &selected,
        error: None,
        result: None,
    };

    let Some(service) = &state.service else {
        view.error = Some("Research is unavailable until the configuration error is fixed".into());
        return page(&state, &view);
    };

    let request = ResearchRequest::from_form(&ticker, &selected, state.config.date_range);
    info!(tickers = ?request.tickers(), "Research submitted");

    let report = match service.run(&request).await {
        Ok(report) => Some(report),
        Err(e) => {
            view.error = Some(e.to_string());
            None
        }
    };
    view.result = report.as_ref();
    page(&state, &view)
}

#[derive(Debug, Deserialize)]
struct ApiRequest {
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    ticker: Option<String>,
}

async fn api_research(
    State(state): State<AppState>,
    Json(body): Json<ApiRequest>,
) -> Result<Json<ResearchReport>, DashboardError> {
    let Some(service) = &state.service else {
        return Err(StockError::Config(
            state
                .config_error
                .clone()
                .unwrap_or_else(|| "research service unavailable".to_string()),
        )
        .into());
    };

    let request = ResearchRequest::new(
        body.ticker.into_iter().chain(body.tickers),
        state.config.date_range,
    );
    Ok(Json(service.run(&request).await?))
}

async fn health() -> &'static str {
    "OK"
}
