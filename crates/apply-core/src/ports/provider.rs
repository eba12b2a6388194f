//! Language-model provider port.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Synchronous JSON-over-HTTP call to a provider.
///
/// Implementations never retry on their own; retry policy belongs to the
/// caller.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// POST `payload` to `url` with a bearer token, bounded by `timeout`.
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        payload: &Value,
        timeout: Duration,
    ) -> ProviderCallResult;
}

/// Why a provider call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection error or timeout; no response was received.
    Network,
    /// The response body is not JSON.
    InvalidJson,
    /// JSON response with a non-2xx status.
    HttpStatus,
}

/// Response body as received.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderBody {
    Json(Value),
    /// Unparsable body or transport error text, kept for diagnostics.
    Raw(String),
}

/// Outcome of one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCallResult {
    /// True only for 2xx responses with a JSON body.
    pub ok: bool,
    /// HTTP status; 0 when no response was received.
    pub status: u16,
    pub body: ProviderBody,
    pub error_kind: Option<ProviderErrorKind>,
}

impl ProviderCallResult {
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ProviderBody::Json(value) => Some(value),
            ProviderBody::Raw(_) => None,
        }
    }

    /// Provider-reported `error.type`, if any.
    pub fn error_type(&self) -> Option<&str> {
        self.json()?.pointer("/error/type")?.as_str()
    }

    /// Human-readable failure detail: the provider's `error.message`, or
    /// the raw body.
    pub fn error_detail(&self) -> Option<String> {
        match &self.body {
            ProviderBody::Json(value) => match value.get("error") {
                Some(Value::String(message)) => Some(message.clone()),
                Some(error) => error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| Some(error.to_string())),
                None => Some(value.to_string()),
            },
            ProviderBody::Raw(raw) if !raw.is_empty() => Some(raw.clone()),
            ProviderBody::Raw(_) => None,
        }
    }

    /// `choices[0].message.content` of a chat-completion response.
    pub fn first_choice_content(&self) -> Option<&str> {
        self.json()?
            .pointer("/choices/0/message/content")?
            .as_str()
    }
}
