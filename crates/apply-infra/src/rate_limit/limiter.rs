//! Two-tier rate limiter: per address and per address+action.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use apply_core::GatewayError;
use apply_core::domain::{RateDecision, RateTier, StoreOutcome};
use apply_core::ports::{Clock, WindowStore};

use crate::identity::IdentityHasher;

/// Limits applied by the [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub window: Duration,
    /// Requests per window per address; zero or negative disables the tier.
    pub address_limit: i64,
    /// Requests per window per address and action; zero or negative
    /// disables the tier.
    pub action_limit: i64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            address_limit: 60,
            action_limit: 30,
        }
    }
}

/// Result of one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    Disabled,
    Checked(StoreOutcome),
}

impl TierOutcome {
    pub fn decision(&self) -> Option<&RateDecision> {
        match self {
            TierOutcome::Checked(outcome) => outcome.decision(),
            TierOutcome::Disabled => None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        match self {
            TierOutcome::Checked(outcome) => outcome.is_allowed(),
            TierOutcome::Disabled => true,
        }
    }
}

/// Both tiers for one request.
#[derive(Debug, Clone)]
pub struct RateCheck {
    pub address: TierOutcome,
    pub action: TierOutcome,
    pub checked_at: DateTime<Utc>,
}

impl RateCheck {
    pub fn tier(&self, tier: RateTier) -> &TierOutcome {
        match tier {
            RateTier::Address => &self.address,
            RateTier::AddressAction => &self.action,
        }
    }

    /// The 429 error when either tier denies. The address tier is reported
    /// first; `retry_after` covers every denying tier.
    pub fn rejection(&self) -> Option<GatewayError> {
        let denied: Vec<(RateTier, u64)> = [RateTier::Address, RateTier::AddressAction]
            .into_iter()
            .filter_map(|tier| {
                let decision = self.tier(tier).decision()?;
                (!decision.allowed).then(|| (tier, decision.retry_after(self.checked_at)))
            })
            .collect();

        let (tier, _) = denied.first().copied()?;
        let retry_after = denied.iter().map(|(_, secs)| *secs).max().unwrap_or(1);

        Some(GatewayError::RateLimited { tier, retry_after })
    }
}

/// Composes identity hashing with a window store.
pub struct RateLimiter {
    hasher: IdentityHasher,
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(
        hasher: IdentityHasher,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
        policy: RateLimitPolicy,
    ) -> Self {
        tracing::info!(
            backend = store.backend(),
            window_secs = policy.window.as_secs(),
            address_limit = policy.address_limit,
            action_limit = policy.action_limit,
            "Rate limiter initialized"
        );
        Self {
            hasher,
            store,
            clock,
            policy,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Count the request against both tiers. Both are always evaluated.
    pub async fn check(&self, client_address: &str, action: &str) -> RateCheck {
        let address = self
            .tier(self.policy.address_limit, || self.hasher.address_key(client_address))
            .await;
        let action = self
            .tier(self.policy.action_limit, || {
                self.hasher.address_action_key(client_address, action)
            })
            .await;

        RateCheck {
            address,
            action,
            checked_at: self.clock.now(),
        }
    }

    async fn tier(&self, limit: i64, key: impl FnOnce() -> String) -> TierOutcome {
        if limit <= 0 {
            return TierOutcome::Disabled;
        }
        let outcome = self
            .store
            .increment_and_check(&key(), limit as u64, self.policy.window)
            .await;
        TierOutcome::Checked(outcome)
    }
}
