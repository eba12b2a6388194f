//! In-memory window store shared by every worker of the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use apply_core::domain::{StoreOutcome, WindowRecord, window_delta};
use apply_core::ports::{Clock, WindowStore};

/// Sweep expired records once the map holds this many keys.
const DEFAULT_PRUNE_THRESHOLD: usize = 10_000;

#[derive(Default)]
struct Records {
    by_key: HashMap<String, WindowRecord>,
    /// No sweep before this instant; set one window after the last sweep.
    next_prune: Option<DateTime<Utc>>,
}

/// In-memory fixed-window counters behind an async mutex.
///
/// The mutex makes the read-modify-write of a record atomic.
/// Note: Counters are per-process and lost on restart.
pub struct InMemoryWindowStore {
    records: Mutex<Records>,
    clock: Arc<dyn Clock>,
    prune_threshold: usize,
}

impl InMemoryWindowStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Records::default()),
            clock,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
        }
    }

    pub fn with_prune_threshold(mut self, threshold: usize) -> Self {
        self.prune_threshold = threshold.max(1);
        self
    }

    /// Number of records currently held, expired ones included.
    #[cfg(test)]
    async fn len(&self) -> usize {
        self.records.lock().await.by_key.len()
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn increment_and_check(&self, key: &str, limit: u64, window: Duration) -> StoreOutcome {
        let mut records = self.records.lock().await;
        let now = self.clock.now();

        let prune_due = records.next_prune.is_none_or(|at| now >= at);
        if prune_due && records.by_key.len() >= self.prune_threshold {
            let before = records.by_key.len();
            records.by_key.retain(|_, record| !record.is_expired(now));
            records.next_prune = Some(now + window_delta(window));
            tracing::debug!(
                pruned = before - records.by_key.len(),
                "Pruned expired rate-limit windows"
            );
        }

        let record = WindowRecord::advance(records.by_key.get(key).copied(), now, window);
        records.by_key.insert(key.to_string(), record);

        StoreOutcome::Decided(record.decide(limit))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
