//! Client configuration, read from the environment

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://www.omdbapi.com/";
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Results per backend page, fixed by the API
pub const PAGE_SIZE: usize = 10;

const ENV_API_KEY: &str = "OMDB_API_KEY";
const ENV_BASE_URL: &str = "OMDB_BASE_URL";
const ENV_DEBOUNCE_MS: &str = "MOVIE_SEARCH_DEBOUNCE_MS";
const ENV_MAX_RETRIES: &str = "MOVIE_SEARCH_MAX_RETRIES";
const ENV_RETRY_DELAY_MS: &str = "MOVIE_SEARCH_RETRY_DELAY_MS";
const ENV_TIMEOUT_SECS: &str = "MOVIE_SEARCH_TIMEOUT_SECS";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub debounce: Duration,
    pub page_size: usize,
    pub max_retries: u32,
    pub default_retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            page_size: PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            default_retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load settings from the process environment.
    ///
    /// `OMDB_API_KEY` is required; everything else falls back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup(ENV_API_KEY)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_API_KEY))?;

        let base_url = lookup(ENV_BASE_URL).unwrap_or(defaults.base_url);

        let debounce = parse_var::<u64, _>(&lookup, ENV_DEBOUNCE_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);
        let max_retries =
            parse_var::<u32, _>(&lookup, ENV_MAX_RETRIES)?.unwrap_or(defaults.max_retries);
        let default_retry_delay = parse_var::<u64, _>(&lookup, ENV_RETRY_DELAY_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.default_retry_delay);
        let request_timeout = parse_var::<u64, _>(&lookup, ENV_TIMEOUT_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            api_key,
            base_url,
            debounce,
            page_size: defaults.page_size,
            max_retries,
            default_retry_delay,
            request_timeout,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            default_delay: self.default_retry_delay,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Retry budget and fallback backoff for the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub default_delay: Duration,
}

impl RetryPolicy {
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 502 | 503 | 504)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ClientConfig::default().retry_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = ClientConfig::from_lookup(lookup_from(&[("OMDB_API_KEY", "abc123")])).unwrap();
        assert_eq!(config.api_key, "abc123");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.default_retry_delay, Duration::from_millis(1000));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OMDB_API_KEY")));

        let err = ClientConfig::from_lookup(lookup_from(&[("OMDB_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("OMDB_API_KEY", "k"),
            ("OMDB_BASE_URL", "http://localhost:8080/"),
            ("MOVIE_SEARCH_DEBOUNCE_MS", "50"),
            ("MOVIE_SEARCH_MAX_RETRIES", "1"),
            ("MOVIE_SEARCH_RETRY_DELAY_MS", "20"),
            ("MOVIE_SEARCH_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/");
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(
            config.retry_policy(),
            RetryPolicy { max_retries: 1, default_delay: Duration::from_millis(20) }
        );
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("OMDB_API_KEY", "k"),
            ("MOVIE_SEARCH_MAX_RETRIES", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MOVIE_SEARCH_MAX_RETRIES", .. }));
    }

    #[test]
    fn retryable_statuses() {
        for status in [429, 502, 503, 504] {
            assert!(RetryPolicy::is_retryable_status(status));
        }
        for status in [200, 400, 401, 404, 500] {
            assert!(!RetryPolicy::is_retryable_status(status));
        }
    }
}
