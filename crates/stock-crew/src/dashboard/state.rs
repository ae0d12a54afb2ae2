//! Shared dashboard state

use crate::config::AppConfig;
use crate::error::{Result, StockError};
use crate::research::ResearchService;
use crew_runtime::LoggingEventHandler;
use minijinja::Environment;
use std::sync::Arc;

/// Read-only state cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Absent when configuration is incomplete; submissions are refused
    pub service: Option<Arc<ResearchService>>,
    pub config_error: Option<String>,
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    pub fn new(config: AppConfig, service: ResearchService) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            service: Some(Arc::new(service)),
            config_error: None,
            templates: Arc::new(load_templates()?),
        })
    }

    /// State that renders `error` as a banner on every page
    pub fn with_config_error(config: AppConfig, error: impl Into<String>) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            service: None,
            config_error: Some(error.into()),
            templates: Arc::new(load_templates()?),
        })
    }

    /// Build the research service, or keep the configuration error for the banner
    pub fn from_config(config: AppConfig) -> Result<Self> {
        match ResearchService::from_config(&config, Some(Arc::new(LoggingEventHandler))) {
            Ok(service) => Self::new(config, service),
            Err(e) if e.is_config() => {
                tracing::error!(error = %e, "Dashboard starting without a research service");
                Self::with_config_error(config, e.to_string())
            }
            Err(e) => Err(e),
        }
    }
}

fn load_templates() -> Result<Environment<'static>> {
    super::templates::environment()
        .map_err(|e| StockError::Config(format!("dashboard templates: {e}")))
}
