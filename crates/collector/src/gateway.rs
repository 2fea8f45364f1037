//! Source Gateway — Polymarket data/gamma API client
//!
//! Positions and activity history come from `data-api.polymarket.com`; market
//! metadata comes from `gamma-api.polymarket.com`. Upstream records are
//! loosely structured, so every field except the record's own key is Option.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

/// Classified gateway failure
///
/// The orchestrator pattern-matches on these to pick a fallback: Permission
/// and Transient route the positions stage into reconstruction, NotFound and
/// IdentifierMismatch are counted and skipped by the market collector, and
/// only Unreachable aborts a trader's run.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("identifier mismatch: {0}")]
    IdentifierMismatch(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("gateway unreachable: {0}")]
    Unreachable(String),
}

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

/// Raw position record from the data API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub proxy_wallet: Option<String>,
    pub asset: Option<String>,
    pub condition_id: Option<String>,
    pub size: Option<f64>,
    pub avg_price: Option<f64>,
    pub initial_value: Option<f64>,
    pub current_value: Option<f64>,
    pub cash_pnl: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub cur_price: Option<f64>,
    pub redeemable: Option<bool>,
    pub title: Option<String>,
    pub outcome: Option<String>,
    pub end_date: Option<String>,
}

/// Raw activity record from the data API
///
/// Fields the pipeline does not map explicitly are kept in `extra`, which
/// becomes the persisted metadata bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub proxy_wallet: Option<String>,
    pub transaction_hash: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub condition_id: Option<String>,
    pub asset: Option<String>,
    pub side: Option<String>,
    pub outcome: Option<String>,
    pub size: Option<f64>,
    pub usdc_size: Option<f64>,
    pub price: Option<f64>,
    pub fee: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Raw market record from the gamma API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub id: Option<String>,
    pub condition_id: Option<String>,
    pub question: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
    pub closed: Option<bool>,
    #[serde(rename = "umaResolutionStatus")]
    pub resolution_status: Option<String>,
    pub volume_num: Option<f64>,
    pub liquidity_num: Option<f64>,
    pub end_date: Option<String>,
}

impl MarketRecord {
    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution_status.as_deref(), Some("resolved"))
    }
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// The three logical operations the pipeline consumes from the upstream API
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn fetch_positions(&self, address: &str) -> Result<Vec<PositionRecord>, GatewayError>;

    async fn fetch_activities(&self, address: &str) -> Result<Vec<ActivityRecord>, GatewayError>;

    async fn fetch_market(&self, market_id: &str) -> Result<MarketRecord, GatewayError>;
}

// ---------------------------------------------------------------------------
// Production client
// ---------------------------------------------------------------------------

/// HTTP gateway over the public Polymarket APIs
pub struct PolymarketGateway {
    client: Client,
    data_api_url: String,
    gamma_api_url: String,
    api_key: Option<String>,
    max_retries: u32,
    retry_base_ms: u64,
    mismatch_status_codes: Vec<u16>,
}

impl PolymarketGateway {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            data_api_url: config.data_api_url.clone(),
            gamma_api_url: config.gamma_api_url.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            retry_base_ms: config.retry_base_ms,
            mismatch_status_codes: config.mismatch_status_codes.clone(),
        })
    }

    /// GET a JSON payload with bounded retry on transient errors
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, GatewayError> {
        let mut attempt = 0u32;
        loop {
            match self.get_json_once(url).await {
                Ok(value) => return Ok(value),
                Err(GatewayError::Transient(msg)) if attempt < self.max_retries => {
                    let delay = backoff_delay_ms(self.retry_base_ms, attempt);
                    warn!(url, attempt, delay_ms = delay, error = %msg, "Transient gateway error, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json_once<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, GatewayError> {
        debug!(url, "Gateway request");

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                GatewayError::Unreachable(e.to_string())
            } else {
                GatewayError::Transient(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(
                status.as_u16(),
                &body,
                &self.mismatch_status_codes,
            ));
        }

        // A success status with a malformed body is treated as transient:
        // the upstream occasionally serves partial responses under load.
        resp.json::<T>()
            .await
            .map_err(|e| GatewayError::Transient(format!("invalid response body: {e}")))
    }
}

/// Map an HTTP error status onto the gateway error taxonomy
fn classify_status(status: u16, body: &str, mismatch_codes: &[u16]) -> GatewayError {
    let detail = format!("status {status}: {body}");
    if mismatch_codes.contains(&status) {
        GatewayError::IdentifierMismatch(detail)
    } else {
        match status {
            401 | 403 => GatewayError::Permission(detail),
            404 => GatewayError::NotFound(detail),
            _ => GatewayError::Transient(detail),
        }
    }
}

/// Exponential backoff with jitter
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let delay = base_ms.saturating_mul(1 << attempt.min(8));
    let jitter = rand::thread_rng().gen_range(0..=base_ms / 2 + 1);
    delay + jitter
}

#[async_trait]
impl Gateway for PolymarketGateway {
    async fn fetch_positions(&self, address: &str) -> Result<Vec<PositionRecord>, GatewayError> {
        let url = format!(
            "{}/positions?user={}&limit=500&sizeThreshold=0",
            self.data_api_url, address
        );
        let positions: Vec<PositionRecord> = self.get_json(&url).await?;
        debug!(address, count = positions.len(), "Positions fetched");
        Ok(positions)
    }

    async fn fetch_activities(&self, address: &str) -> Result<Vec<ActivityRecord>, GatewayError> {
        let url = format!(
            "{}/activity?user={}&limit=500&sortBy=TIMESTAMP&sortDirection=ASC",
            self.data_api_url, address
        );
        let activities: Vec<ActivityRecord> = self.get_json(&url).await?;
        debug!(address, count = activities.len(), "Activities fetched");
        Ok(activities)
    }

    async fn fetch_market(&self, market_id: &str) -> Result<MarketRecord, GatewayError> {
        let url = format!("{}/markets/{}", self.gamma_api_url, market_id);
        let market: MarketRecord = self.get_json(&url).await?;
        debug!(market_id, "Market fetched");
        Ok(market)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
