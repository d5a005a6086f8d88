//! AngelOne SmartAPI login adapter.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{LoginRequest, VenueAuthenticator};
use crate::config::VenueConfig;
use crate::error::{AuthError, HedgeError, Result};

const LOGIN_PATH: &str = "/rest/auth/angelbroking/user/v1/loginByPassword";

#[derive(Serialize)]
struct LoginBody<'a> {
    clientcode: &'a str,
    password: &'a str,
    totp: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errorcode: Option<String>,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(default)]
    jwt_token: Option<String>,
}

/// Session-creation client for the SmartAPI REST gateway
#[derive(Clone)]
pub struct AngelOneClient {
    http: Client,
    base_url: String,
    headers: HeaderMap,
}

impl AngelOneClient {
    pub fn new(config: &VenueConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HedgeError::Internal(format!("failed to build venue HTTP client: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-usertype"),
            HeaderValue::from_static("USER"),
        );
        headers.insert(
            HeaderName::from_static("x-sourceid"),
            HeaderValue::from_static("WEB"),
        );
        for (name, value) in [
            ("x-clientlocalip", &config.client_local_ip),
            ("x-clientpublicip", &config.client_public_ip),
            ("x-macaddress", &config.mac_address),
            ("x-privatekey", &config.api_key),
        ] {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(value).map_err(|e| {
                    HedgeError::InvalidConfig(format!("invalid {} header: {}", name, e))
                })?,
            );
        }

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl VenueAuthenticator for AngelOneClient {
    async fn create_session(&self, request: &LoginRequest) -> std::result::Result<String, AuthError> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        debug!(client_id = %request.client_id, "Requesting venue session");

        let resp = self
            .http
            .post(&url)
            .headers(self.headers.clone())
            .json(&LoginBody {
                clientcode: &request.client_id,
                password: &request.mpin,
                totp: &request.passcode,
            })
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(AuthError::Transport)?;

        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: LoginResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Malformed(e.to_string()))?;

        let token = parsed
            .data
            .and_then(|d| d.jwt_token)
            .filter(|t| !t.is_empty());

        match (parsed.status, token) {
            (true, Some(token)) => Ok(token),
            (true, None) => Err(AuthError::Malformed(
                "login succeeded without a jwtToken".to_string(),
            )),
            (false, _) => Err(AuthError::Rejected {
                message: parsed.message.unwrap_or_else(|| "unknown error".to_string()),
                code: parsed.errorcode.unwrap_or_default(),
            }),
        }
    }
}
