//! reqwest-backed provider client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use apply_core::ports::{ProviderBody, ProviderCallResult, ProviderClient, ProviderErrorKind};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("apply-gateway/", env!("CARGO_PKG_VERSION"));

/// JSON-over-HTTP client for chat-completion providers.
///
/// One shared connection pool; the per-call timeout is applied to each
/// request.
#[derive(Clone)]
pub struct HttpProviderClient {
    client: Client,
}

impl HttpProviderClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_nodelay(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    fn network_failure(error: reqwest::Error) -> ProviderCallResult {
        ProviderCallResult {
            ok: false,
            status: 0,
            body: ProviderBody::Raw(error.to_string()),
            error_kind: Some(ProviderErrorKind::Network),
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        payload: &Value,
        timeout: Duration,
    ) -> ProviderCallResult {
        let response = match self
            .client
            .post(url)
            .bearer_auth(bearer_token)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(timeout = e.is_timeout(), error = %e, "Provider request failed");
                return Self::network_failure(e);
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(status = status.as_u16(), error = %e, "Provider response unreadable");
                return Self::network_failure(e);
            }
        };

        let json = match serde_json::from_str::<Value>(&text) {
            Ok(json) => json,
            Err(_) => {
                tracing::warn!(status = status.as_u16(), "Provider returned a non-JSON body");
                return ProviderCallResult {
                    ok: false,
                    status: status.as_u16(),
                    body: ProviderBody::Raw(text),
                    error_kind: Some(ProviderErrorKind::InvalidJson),
                };
            }
        };

        let ok = status.is_success();
        if !ok {
            tracing::debug!(status = status.as_u16(), "Provider returned an error status");
        }

        ProviderCallResult {
            ok,
            status: status.as_u16(),
            body: ProviderBody::Json(json),
            error_kind: (!ok).then_some(ProviderErrorKind::HttpStatus),
        }
    }
}
