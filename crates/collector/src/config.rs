//! Runtime configuration from environment variables
//!
//! Load `.env` with `dotenvy` before calling `Config::from_env()`.

use std::env;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Data API host (positions, activity history)
    pub data_api_url: String,
    /// Gamma API host (market metadata)
    pub gamma_api_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    /// Retry budget for transient gateway errors
    pub max_retries: u32,
    pub retry_base_ms: u64,
    /// HTTP statuses treated as an expected identifier mismatch rather than a
    /// failure. The upstream gamma API answers 422 when asked for a condition
    /// id instead of a market id; which codes are "expected" is an upstream
    /// quirk, so it stays configurable.
    pub mismatch_status_codes: Vec<u16>,
    /// Pause between traders in a batch run
    pub rate_limit_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_api_url: "https://data-api.polymarket.com".to_string(),
            gamma_api_url: "https://gamma-api.polymarket.com".to_string(),
            api_key: None,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_ms: 250,
            mismatch_status_codes: vec![422],
            rate_limit_ms: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            data_api_url: env_or("POLYMARKET_DATA_API_URL", defaults.data_api_url),
            gamma_api_url: env_or("POLYMARKET_API_URL", defaults.gamma_api_url),
            api_key: env::var("POLYMARKET_API_KEY").ok().filter(|k| !k.is_empty()),
            request_timeout_secs: parse_or("GATEWAY_TIMEOUT_SECS", defaults.request_timeout_secs),
            max_retries: parse_or("GATEWAY_MAX_RETRIES", defaults.max_retries),
            retry_base_ms: parse_or("GATEWAY_RETRY_BASE_MS", defaults.retry_base_ms),
            mismatch_status_codes: parse_code_list(
                "GATEWAY_MISMATCH_STATUS_CODES",
                defaults.mismatch_status_codes,
            ),
            rate_limit_ms: parse_or("COLLECTION_RATE_LIMIT_MS", defaults.rate_limit_ms),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated status code list, e.g. "422,400"
fn parse_code_list(key: &str, default: Vec<u16>) -> Vec<u16> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .filter_map(|c| c.trim().parse().ok())
            .collect(),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mismatch_status_codes, vec![422]);
        assert_eq!(config.max_retries, 3);
        assert!(config.data_api_url.contains("data-api"));
    }

    #[test]
    fn test_parse_code_list() {
        std::env::set_var("TEST_MISMATCH_CODES", "422, 418");
        assert_eq!(parse_code_list("TEST_MISMATCH_CODES", vec![]), vec![422, 418]);
        std::env::remove_var("TEST_MISMATCH_CODES");
        assert_eq!(parse_code_list("TEST_MISMATCH_CODES", vec![422]), vec![422]);
    }
}
