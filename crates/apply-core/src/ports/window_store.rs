//! Window counter store port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::StoreOutcome;

/// Fixed-window request counter keyed by opaque identity key.
///
/// `increment_and_check` is the only way to touch a window record. It must be
/// atomic per key: two concurrent calls for the same key never both observe
/// the same count. Backends that cannot be engaged report
/// [`StoreOutcome::Degraded`] instead of blocking or failing the request.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Count one request for `key` and decide it against `limit`.
    async fn increment_and_check(&self, key: &str, limit: u64, window: Duration) -> StoreOutcome;

    /// Short backend name for logs and degraded outcomes.
    fn backend(&self) -> &'static str;
}

/// Window store backend errors.
#[derive(Debug, thiserror::Error)]
pub enum WindowStoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl WindowStoreError {
    /// Turn a backend failure into the fail-open outcome.
    pub fn into_degraded(self, backend: &'static str) -> StoreOutcome {
        tracing::warn!(backend, error = %self, "Window store unavailable, failing open");
        StoreOutcome::Degraded {
            backend,
            reason: self.to_string(),
        }
    }
}
