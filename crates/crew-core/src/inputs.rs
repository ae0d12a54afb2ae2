//! Kickoff inputs for a crew
//!
//! `Inputs` is the key-value map that parameterises a crew run. Agent goals,
//! task descriptions and expected outputs are templates, and these values are
//! what they get rendered with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known input keys
pub mod keys {
    /// Ticker symbol (or comma-separated list of symbols) under research
    pub const TICKER: &str = "ticker";
    /// Wall-clock time of the submission, formatted `%Y-%m-%d %H:%M:%S`
    pub const DATETIME: &str = "datetime";
}

/// Values passed to `Crew::kickoff`
///
/// # Example
///
/// ```
/// use crew_core::Inputs;
///
/// let inputs = Inputs::new()
///     .with_ticker("AAPL")
///     .with_datetime("2024-08-08 10:00:00");
///
/// assert_eq!(inputs.ticker(), Some("AAPL"));
/// assert_eq!(inputs.datetime(), Some("2024-08-08 10:00:00"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inputs {
    data: BTreeMap<String, serde_json::Value>,
}

impl Inputs {
    /// Create an empty input map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ticker under research
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.insert(keys::TICKER, serde_json::json!(ticker.into()));
        self
    }

    /// Set the submission timestamp
    pub fn with_datetime(mut self, datetime: impl Into<String>) -> Self {
        self.insert(keys::DATETIME, serde_json::json!(datetime.into()));
        self
    }

    /// Set an arbitrary value
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Ticker under research, if set
    pub fn ticker(&self) -> Option<&str> {
        self.get_str(keys::TICKER)
    }

    /// Submission timestamp, if set
    pub fn datetime(&self) -> Option<&str> {
        self.get_str(keys::DATETIME)
    }

    /// Insert a value
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }

    /// The whole map as a JSON object, ready to hand to a template
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
