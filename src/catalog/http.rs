use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::StrategyCatalog;
use crate::config::{ControlPlaneConfig, RetryConfig};
use crate::error::{FetchError, HedgeError, Result};
use crate::session::SessionHandle;
use crate::strategy::StrategyRecord;

const ACTIVE_STRATEGIES_PATH: &str = "/active-strategies";

/// Response envelope of `GET /active-strategies`
#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    #[serde(default)]
    success: Option<bool>,
    /// Entries are decoded one by one so a bad entry stays strategy-scoped
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
}

/// Parse a catalog body into records; failures map to the catalog error taxonomy.
pub fn parse_catalog(body: &str) -> std::result::Result<Vec<StrategyRecord>, FetchError> {
    let envelope: CatalogEnvelope = serde_json::from_str(body).map_err(FetchError::Malformed)?;

    match envelope.success {
        Some(true) => Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(StrategyRecord::from_value)
            .collect()),
        Some(false) => Err(FetchError::Rejected(
            envelope.error.unwrap_or_else(|| "Unknown error".to_string()),
        )),
        None => Err(FetchError::Rejected(
            "response carries no success flag".to_string(),
        )),
    }
}

/// Control-plane client for the active-strategy catalog
#[derive(Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpCatalogClient {
    pub fn new(config: &ControlPlaneConfig, retry: RetryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_token))
                .map_err(|e| HedgeError::InvalidConfig(format!("invalid API token header: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| HedgeError::InvalidConfig(format!("invalid user agent: {}", e)))?,
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                HedgeError::Internal(format!("failed to build control-plane HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, ACTIVE_STRATEGIES_PATH)
    }

    async fn fetch_once(&self) -> std::result::Result<Vec<StrategyRecord>, FetchError> {
        let resp = self
            .http
            .get(self.endpoint())
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(FetchError::Transport)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_catalog(&body)
    }
}

#[async_trait]
impl StrategyCatalog for HttpCatalogClient {
    async fn fetch_active_strategies(
        &self,
        _session: &SessionHandle,
    ) -> std::result::Result<Vec<StrategyRecord>, FetchError> {
        info!("Fetching active strategies from control-plane");

        let attempts = self.retry.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(records) => {
                    info!(count = records.len(), "Fetched active strategies");
                    return Ok(records);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, error = %e, "Catalog fetch failed, retrying");
                    tokio::time::sleep(Duration::from_secs(self.retry.retry_delay_secs)).await;
                }
                Err(e) => {
                    debug!(attempt, "Giving up on catalog fetch");
                    return Err(e);
                }
            }
        }
    }
}
