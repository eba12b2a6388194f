//! Error handling - every failure becomes an `{ok:false, ...}` envelope.

use actix_web::{HttpResponse, ResponseError, http::StatusCode, http::header};
use apply_core::GatewayError;
use apply_shared::ErrorEnvelope;
use std::fmt;

/// Application-level error: a gateway error plus request correlation.
#[derive(Debug)]
pub struct AppError {
    error: GatewayError,
    request_id: Option<String>,
}

impl AppError {
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    fn envelope(&self) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(self.error.kind()).with_message(self.error.to_string());

        match &self.error {
            GatewayError::UnknownAction(action) => envelope = envelope.with_action(action.clone()),
            GatewayError::Upstream { failure, .. } => {
                envelope = envelope.with_upstream(failure.status, failure.detail.clone())
            }
            GatewayError::RateLimited { retry_after, .. } => {
                envelope = envelope.with_retry_after(*retry_after)
            }
            _ => {}
        }

        match &self.request_id {
            Some(id) => envelope.with_request_id(id.clone()),
            None => envelope,
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(error: GatewayError) -> Self {
        Self {
            error,
            request_id: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(kind = self.error.kind(), status = status.as_u16(), "Request failed");
        }

        let mut builder = HttpResponse::build(status);
        match &self.error {
            GatewayError::RateLimited { retry_after, .. } => {
                builder.insert_header((header::RETRY_AFTER, retry_after.to_string()));
            }
            GatewayError::MethodNotAllowed => {
                builder.insert_header((header::ALLOW, "POST"));
            }
            _ => {}
        }

        builder.json(self.envelope())
    }
}
