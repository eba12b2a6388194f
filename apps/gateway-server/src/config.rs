//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which window store backs the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// Redis when `REDIS_URL` is set, in-memory otherwise.
    Auto,
    Memory,
    Redis,
    File,
}

impl FromStr for RateLimitBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "file" => Ok(Self::File),
            other => Err(format!("unknown rate limit backend: {other}")),
        }
    }
}

/// Rate limiter configuration.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub ip_max: i64,
    pub action_max: i64,
    /// `None` means a random pepper is generated at startup.
    pub pepper: Option<String>,
    pub backend: RateLimitBackend,
    pub dir: PathBuf,
    pub lock_timeout: Duration,
    pub key_prefix: String,
    pub redis_url: Option<String>,
    pub redis_connect_timeout: Duration,
}

impl std::fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("window", &self.window)
            .field("ip_max", &self.ip_max)
            .field("action_max", &self.action_max)
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend)
            .field("dir", &self.dir)
            .field("lock_timeout", &self.lock_timeout)
            .field("key_prefix", &self.key_prefix)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One upstream provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Scout (job summary) provider settings.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub provider: ProviderConfig,
    pub fallback_models: Vec<String>,
}

/// Draft (application text) provider settings.
#[derive(Debug, Clone)]
pub struct DraftConfig {
    pub provider: ProviderConfig,
    pub fallback_lang: String,
    pub min_words: u32,
    pub max_words: u32,
}

/// End-user key gate.
#[derive(Clone, Default)]
pub struct UserKeyConfig {
    pub require: bool,
    /// Empty means any non-empty key is accepted.
    pub allowed: Vec<String>,
}

impl std::fmt::Debug for UserKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserKeyConfig")
            .field("require", &self.require)
            .field("allowed", &self.allowed.len())
            .finish()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub trust_proxy_headers: bool,
    pub user_keys: UserKeyConfig,
    pub scout: ScoutConfig,
    pub draft: DraftConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vars = Vars(&lookup);

        Self {
            host: vars.string("HOST", "127.0.0.1"),
            port: vars.parse("PORT", 8080),
            trust_proxy_headers: vars.flag("TRUST_PROXY_HEADERS", false),
            user_keys: UserKeyConfig {
                require: vars.flag("REQUIRE_USER_KEY", false),
                allowed: vars.list("APP_USER_KEYS", &[]),
            },
            scout: ScoutConfig {
                provider: ProviderConfig {
                    api_key: vars.value("PERPLEXITY_API_KEY"),
                    api_url: vars.string(
                        "PERPLEXITY_API_URL",
                        "https://api.perplexity.ai/chat/completions",
                    ),
                    model: vars.string("PERPLEXITY_MODEL", "sonar"),
                    timeout: Duration::from_secs(vars.parse("SCOUT_TIMEOUT_SECS", 25)),
                },
                fallback_models: vars.list(
                    "PERPLEXITY_FALLBACK_MODELS",
                    &["sonar", "sonar-pro", "sonar-reasoning"],
                ),
            },
            draft: DraftConfig {
                provider: ProviderConfig {
                    api_key: vars.value("OPENAI_API_KEY"),
                    api_url: vars.string(
                        "OPENAI_API_URL",
                        "https://api.openai.com/v1/chat/completions",
                    ),
                    model: vars.string("OPENAI_MODEL", "gpt-4o-mini"),
                    timeout: Duration::from_secs(vars.parse("DRAFT_TIMEOUT_SECS", 45)),
                },
                fallback_lang: vars.string("DRAFT_FALLBACK_LANG", "fi"),
                min_words: vars.parse("DRAFT_MIN_WORDS", 150),
                max_words: vars.parse("DRAFT_MAX_WORDS", 250),
            },
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(vars.parse::<u64>("RATE_LIMIT_WINDOW_SECS", 60).max(1)),
                ip_max: vars.parse("RATE_LIMIT_IP_MAX", 60),
                action_max: vars.parse("RATE_LIMIT_ACTION_MAX", 30),
                pepper: vars.value("RATE_LIMIT_PEPPER"),
                backend: vars.parse("RATE_LIMIT_BACKEND", RateLimitBackend::Auto),
                dir: vars
                    .value("RATE_LIMIT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| env::temp_dir().join("apply-gateway-ratelimit")),
                lock_timeout: Duration::from_millis(vars.parse("RATE_LIMIT_LOCK_TIMEOUT_MS", 2000)),
                key_prefix: vars.string("RATE_LIMIT_KEY_PREFIX", "apply:rl"),
                redis_url: vars.value("REDIS_URL"),
                redis_connect_timeout: Duration::from_secs(
                    vars.parse("REDIS_CONNECT_TIMEOUT_SECS", 5),
                ),
            },
        }
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    /// Non-blank trimmed value.
    fn value(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.value(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> T {
        match self.value(name) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(variable = name, "Unparsable value, using default");
                default
            }),
        }
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        match self.value(name).map(|v| v.to_lowercase()) {
            None => default,
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            Some(_) => {
                tracing::warn!(variable = name, "Unparsable flag, using default");
                default
            }
        }
    }

    /// Comma separated, trimmed, blanks dropped.
    fn list(&self, name: &str, default: &[&str]) -> Vec<String> {
        match self.value(name) {
            None => default.iter().map(|s| s.to_string()).collect(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}
