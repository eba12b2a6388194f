//! Gateway error taxonomy.
//!
//! Every failure the gateway can report to a caller is a variant here. The
//! server turns them into `{ok:false, error, message}` envelopes using
//! [`GatewayError::kind`] and [`GatewayError::status_code`].

use thiserror::Error;

use crate::domain::RateTier;
use crate::ports::{ProviderCallResult, ProviderErrorKind};

/// Upper bound on the provider error text carried back to the caller.
const DETAIL_LIMIT: usize = 500;

/// Gateway errors - each maps to one stable error kind.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Only POST requests are accepted")]
    MethodNotAllowed,

    #[error("The request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("The request has no action")]
    MissingAction,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Provide at least one of jobTitle, jobUrl, adUrl or role")]
    MissingInputs,

    #[error("Provide your API key in the X-App-API-Key header")]
    MissingApiKey,

    #[error("API key is invalid or out of quota")]
    ForbiddenOrNoQuota,

    #[error("Rate limit exceeded. Try again in {retry_after} seconds")]
    RateLimited { tier: RateTier, retry_after: u64 },

    #[error("The {provider} provider is not configured on the server")]
    MissingProviderKey { provider: &'static str },

    #[error("The {provider} provider call failed ({})", failure.kind.as_str())]
    Upstream {
        provider: &'static str,
        failure: UpstreamFailure,
    },

    #[error("The provider returned an empty summary")]
    EmptySummary,

    #[error("The provider returned an empty draft")]
    EmptyDraft,
}

impl GatewayError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::MissingAction => "missing_action",
            GatewayError::UnknownAction(_) => "unknown_action",
            GatewayError::MissingInputs => "missing_inputs",
            GatewayError::MissingApiKey => "missing_api_key",
            GatewayError::ForbiddenOrNoQuota => "forbidden_or_no_quota",
            GatewayError::RateLimited { tier, .. } => tier.error_kind(),
            GatewayError::MissingProviderKey { .. } => "missing_provider_key",
            GatewayError::Upstream { failure, .. } => failure.kind.as_str(),
            GatewayError::EmptySummary => "empty_summary",
            GatewayError::EmptyDraft => "empty_draft",
        }
    }

    /// HTTP status code the error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MethodNotAllowed => 405,
            GatewayError::PayloadTooLarge { .. } => 413,
            GatewayError::MissingAction
            | GatewayError::UnknownAction(_)
            | GatewayError::MissingInputs => 400,
            GatewayError::MissingApiKey => 401,
            GatewayError::ForbiddenOrNoQuota => 403,
            GatewayError::RateLimited { .. } => 429,
            GatewayError::MissingProviderKey { .. } => 500,
            GatewayError::Upstream { .. }
            | GatewayError::EmptySummary
            | GatewayError::EmptyDraft => 502,
        }
    }

    pub fn upstream(provider: &'static str, result: &ProviderCallResult) -> Self {
        GatewayError::Upstream {
            provider,
            failure: UpstreamFailure::from_result(result),
        }
    }
}

/// Upstream failure kinds as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Network,
    InvalidJson,
    ProviderError,
}

impl UpstreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamKind::Network => "network",
            UpstreamKind::InvalidJson => "invalid_json",
            UpstreamKind::ProviderError => "provider_error",
        }
    }
}

/// Details of a failed provider call that are safe to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub kind: UpstreamKind,
    /// Provider HTTP status; 0 when no response was received.
    pub status: u16,
    pub detail: Option<String>,
}

impl UpstreamFailure {
    pub fn from_result(result: &ProviderCallResult) -> Self {
        let kind = match result.error_kind {
            Some(ProviderErrorKind::Network) => UpstreamKind::Network,
            Some(ProviderErrorKind::InvalidJson) => UpstreamKind::InvalidJson,
            Some(ProviderErrorKind::HttpStatus) | None => UpstreamKind::ProviderError,
        };

        let detail = result.error_detail().map(|text| {
            if text.chars().count() > DETAIL_LIMIT {
                text.chars().take(DETAIL_LIMIT).collect()
            } else {
                text
            }
        });

        Self {
            kind,
            status: result.status,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ProviderBody;

    #[test]
    fn test_kinds_and_statuses() {
        assert_eq!(GatewayError::MissingAction.kind(), "missing_action");
        assert_eq!(GatewayError::MissingAction.status_code(), 400);
        assert_eq!(GatewayError::MethodNotAllowed.status_code(), 405);
        assert_eq!(
            GatewayError::MissingProviderKey {
                provider: "perplexity"
            }
            .status_code(),
            500
        );

        let limited = GatewayError::RateLimited {
            tier: RateTier::AddressAction,
            retry_after: 12,
        };
        assert_eq!(limited.kind(), "rate_limited_action");
        assert_eq!(limited.status_code(), 429);

        let oversized = GatewayError::PayloadTooLarge { limit: 65_536 };
        assert_eq!(oversized.kind(), "payload_too_large");
        assert_eq!(oversized.status_code(), 413);
    }

    #[test]
    fn test_upstream_detail_is_bounded() {
        let result = ProviderCallResult {
            ok: false,
            status: 200,
            body: ProviderBody::Raw("x".repeat(2_000)),
            error_kind: Some(ProviderErrorKind::InvalidJson),
        };

        let err = GatewayError::upstream("openai", &result);
        assert_eq!(err.kind(), "invalid_json");
        assert_eq!(err.status_code(), 502);
        match err {
            GatewayError::Upstream { failure, .. } => {
                assert_eq!(failure.detail.map(|d| d.len()), Some(DETAIL_LIMIT));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
