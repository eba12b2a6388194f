//! Standardized response envelopes.
//!
//! Every response body carries `ok`. Successes flatten their payload next to
//! it; failures add a machine-readable `error` kind and optional details.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Successful response: `{ok: true, ...payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Failure response: `{ok: false, error, message?, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub ok: bool,

    /// Stable error kind, e.g. `unknown_action`.
    pub error: String,

    /// A human-readable explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The unrecognized action, echoed for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// HTTP status returned by the upstream provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,

    /// Provider error detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,

    /// Seconds to wait before retrying a rate-limited request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,

    /// Request ID for debugging purposes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            message: None,
            action: None,
            upstream_status: None,
            detail: None,
            retry_after: None,
            request_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_upstream(mut self, status: u16, detail: Option<String>) -> Self {
        if status != 0 {
            self.upstream_status = Some(status);
        }
        self.detail = detail.map(Value::String);
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
