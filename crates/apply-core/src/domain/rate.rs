//! Fixed-window rate-limit bookkeeping.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Counter for one identity key within one fixed window.
///
/// A record whose `reset_at` is not in the future is expired and must be
/// treated as absent: the next access replaces it with a fresh window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRecord {
    pub count: u64,
    pub reset_at: DateTime<Utc>,
}

impl WindowRecord {
    /// A fresh, empty window starting at `now`.
    pub fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + window_delta(window),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }

    /// Count one request against `current`, replacing it first if it is
    /// absent or expired.
    pub fn advance(current: Option<Self>, now: DateTime<Utc>, window: Duration) -> Self {
        let mut record = match current {
            Some(record) if !record.is_expired(now) => record,
            _ => Self::open(now, window),
        };
        record.count = record.count.saturating_add(1);
        record
    }

    pub fn decide(&self, limit: u64) -> RateDecision {
        RateDecision {
            allowed: self.count <= limit,
            limit,
            count: self.count,
            remaining: limit.saturating_sub(self.count),
            reset_at: self.reset_at,
        }
    }
}

/// Outcome of counting one request against a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u64,
    pub count: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    /// Seconds until the window resets, never less than one.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

/// What a window store reports for one `increment_and_check` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The increment was applied atomically.
    Decided(RateDecision),
    /// The backend could not be engaged; the request is let through.
    Degraded {
        backend: &'static str,
        reason: String,
    },
}

impl StoreOutcome {
    pub fn is_allowed(&self) -> bool {
        match self {
            StoreOutcome::Decided(decision) => decision.allowed,
            StoreOutcome::Degraded { .. } => true,
        }
    }

    pub fn decision(&self) -> Option<&RateDecision> {
        match self {
            StoreOutcome::Decided(decision) => Some(decision),
            StoreOutcome::Degraded { .. } => None,
        }
    }
}

/// The two independent rate-limit tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTier {
    /// Keyed by client address alone.
    Address,
    /// Keyed by client address and action.
    AddressAction,
}

impl RateTier {
    pub fn error_kind(&self) -> &'static str {
        match self {
            RateTier::Address => "rate_limited",
            RateTier::AddressAction => "rate_limited_action",
        }
    }
}

/// Convert a std window length into a chrono delta, saturating on overflow.
pub fn window_delta(window: Duration) -> TimeDelta {
    TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX)
}
