//! Environment configuration helpers
//!
//! Small typed accessors over `std::env` so each crate's config loader reads
//! the same way and reports bad values the same way.

use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank
    #[error("{0} is not set")]
    Missing(String),

    /// A variable is present but cannot be parsed
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Read a variable, treating blank values as absent
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable
///
/// Returns `Ok(None)` when the variable is absent.
pub fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
            reason: e.to_string(),
        }),
    }
}

/// Read a comma-separated list, dropping blank items
pub fn env_list(key: &str) -> Option<Vec<String>> {
    env_var(key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_blank_is_absent() {
        unsafe {
            std::env::set_var("CREW_UTILS_TEST_BLANK", "   ");
        }
        assert_eq!(env_var("CREW_UTILS_TEST_BLANK"), None);
        assert_eq!(env_var("CREW_UTILS_TEST_NEVER_SET"), None);
    }

    #[test]
    fn test_env_parse() {
        unsafe {
            std::env::set_var("CREW_UTILS_TEST_NUM", "42");
            std::env::set_var("CREW_UTILS_TEST_BAD_NUM", "forty-two");
        }
        assert_eq!(env_parse::<u32>("CREW_UTILS_TEST_NUM"), Ok(Some(42)));
        assert_eq!(env_parse::<u32>("CREW_UTILS_TEST_UNSET_NUM"), Ok(None));

        let err = env_parse::<u32>("CREW_UTILS_TEST_BAD_NUM").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "CREW_UTILS_TEST_BAD_NUM"));
    }

    #[test]
    fn test_env_list() {
        unsafe {
            std::env::set_var("CREW_UTILS_TEST_LIST", "AAPL, MSFT,,NVDA ");
        }
        assert_eq!(
            env_list("CREW_UTILS_TEST_LIST"),
            Some(vec!["AAPL".to_string(), "MSFT".to_string(), "NVDA".to_string()])
        );
    }
}
