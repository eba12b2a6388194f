//! Application state - shared across all handlers and workers.

use std::sync::Arc;

use apply_core::domain::ModelFallbackChain;
use apply_core::ports::{Clock, ProviderClient, SystemClock, WindowStore};
use apply_core::services::{
    DraftService, DraftSettings, ProviderSettings, ScoutService, ScoutSettings,
};
use apply_infra::{
    FileWindowStore, HttpProviderClient, IdentityHasher, InMemoryWindowStore, RateLimitPolicy,
    RateLimiter,
};

#[cfg(feature = "redis")]
use apply_infra::{RedisConfig, RedisWindowStore};

use crate::config::{AppConfig, ProviderConfig, RateLimitBackend, RateLimitConfig, UserKeyConfig};

/// Shared application state.
///
/// Built once at startup and cloned into every worker, so all workers
/// count against the same window store.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub scout: Arc<ScoutService>,
    pub draft: Arc<DraftService>,
    pub user_keys: Arc<UserKeyConfig>,
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// Build the application state with the configured backends.
    pub async fn new(config: &AppConfig) -> std::io::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = build_window_store(&config.rate_limit, clock.clone()).await;
        let client: Arc<dyn ProviderClient> =
            Arc::new(HttpProviderClient::new().map_err(std::io::Error::other)?);

        let state = Self::from_parts(config, client, store, clock);
        tracing::info!(backend = state.limiter.backend(), "Application state initialized");
        Ok(state)
    }

    /// Assemble the state around an existing provider client and store.
    pub fn from_parts(
        config: &AppConfig,
        client: Arc<dyn ProviderClient>,
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limit = &config.rate_limit;
        let pepper = rate_limit.pepper.clone().unwrap_or_else(|| {
            tracing::warn!(
                "RATE_LIMIT_PEPPER not set. Using a random per-process pepper; \
                 identity keys will not match across restarts or processes."
            );
            uuid::Uuid::new_v4().simple().to_string()
        });

        let limiter = RateLimiter::new(
            IdentityHasher::new(pepper),
            store,
            clock,
            RateLimitPolicy {
                window: rate_limit.window,
                address_limit: rate_limit.ip_max,
                action_limit: rate_limit.action_max,
            },
        );

        let scout = ScoutService::new(
            client.clone(),
            ScoutSettings {
                provider: provider_settings("perplexity", &config.scout.provider),
                models: ModelFallbackChain::new(
                    config.scout.provider.model.clone(),
                    &config.scout.fallback_models,
                ),
                default_lang: config.draft.fallback_lang.clone(),
            },
        );

        let draft = DraftService::new(
            client,
            DraftSettings {
                provider: provider_settings("openai", &config.draft.provider),
                model: config.draft.provider.model.clone(),
                default_lang: config.draft.fallback_lang.clone(),
                min_words: config.draft.min_words,
                max_words: config.draft.max_words,
            },
        );

        for (name, has_key) in [
            ("perplexity", scout.settings().provider.has_key()),
            ("openai", draft.settings().provider.has_key()),
        ] {
            if !has_key {
                tracing::warn!(provider = name, "Provider key not configured");
            }
        }

        Self {
            limiter: Arc::new(limiter),
            scout: Arc::new(scout),
            draft: Arc::new(draft),
            user_keys: Arc::new(config.user_keys.clone()),
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }
}

fn provider_settings(name: &'static str, config: &ProviderConfig) -> ProviderSettings {
    ProviderSettings {
        name,
        endpoint: config.api_url.clone(),
        api_key: config.api_key.clone(),
        timeout: config.timeout,
    }
}

/// Pick the window store once at startup.
///
/// `auto` prefers Redis when `REDIS_URL` is set; a Redis connection failure
/// falls back to the file-lock store, and an unusable directory falls back
/// to in-memory counters.
async fn build_window_store(
    config: &RateLimitConfig,
    clock: Arc<dyn Clock>,
) -> Arc<dyn WindowStore> {
    match config.backend {
        RateLimitBackend::Memory => memory_store(clock),
        RateLimitBackend::File => file_store(config, clock),
        RateLimitBackend::Redis => redis_store(config, clock).await,
        RateLimitBackend::Auto if config.redis_url.is_some() => redis_store(config, clock).await,
        RateLimitBackend::Auto => memory_store(clock),
    }
}

fn memory_store(clock: Arc<dyn Clock>) -> Arc<dyn WindowStore> {
    tracing::info!("Using in-memory window store");
    Arc::new(InMemoryWindowStore::new(clock))
}

fn file_store(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Arc<dyn WindowStore> {
    match FileWindowStore::new(config.dir.clone(), clock.clone(), config.lock_timeout) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "File window store unavailable. Using in-memory fallback.");
            memory_store(clock)
        }
    }
}

#[cfg(feature = "redis")]
async fn redis_store(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Arc<dyn WindowStore> {
    let Some(url) = config.redis_url.clone() else {
        tracing::warn!("REDIS_URL not set. Using file window store.");
        return file_store(config, clock);
    };

    let redis_config = RedisConfig {
        url,
        connect_timeout: config.redis_connect_timeout,
        key_prefix: config.key_prefix.clone(),
    };
    match RedisWindowStore::new(redis_config, clock.clone()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to Redis. Using file window store fallback.");
            file_store(config, clock)
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn redis_store(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Arc<dyn WindowStore> {
    tracing::warn!("Built without the redis feature. Using file window store.");
    file_store(config, clock)
}
