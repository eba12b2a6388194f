//! Provider-backed action handlers.

mod draft;
mod scout;

use std::time::Duration;

pub use draft::{DraftService, DraftSettings};
pub use scout::{ScoutService, ScoutSettings};

use crate::error::GatewayError;

/// Where and how to reach one provider.
#[derive(Clone)]
pub struct ProviderSettings {
    /// Short provider name used in errors and logs.
    pub name: &'static str,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// The configured key, or `missing_provider_key`.
    fn require_key(&self) -> Result<&str, GatewayError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(GatewayError::MissingProviderKey {
                provider: self.name,
            })
    }

    pub fn has_key(&self) -> bool {
        self.require_key().is_ok()
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
