//! Shared utilities for stock-crew
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-variable configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_list, env_parse, env_var};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
