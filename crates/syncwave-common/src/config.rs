//! Application configuration loaded from environment variables.
//!
//! Mirrors the flat env-var convention used across this codebase's services:
//! required values panic with a clear message at startup, optional values
//! fall back to the documented defaults from the operations runbook.

use std::env;
use std::time::Duration;

/// Per-provider fetch policy: timeout, retry budget, circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_base: Duration,
    pub cb_threshold: u32,
    pub cb_open: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub min_pool: u32,
    pub max_pool: u32,
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub endpoint: String,
    pub cb_threshold: u32,
    pub cb_open: Duration,
    pub spill_capacity: usize,
    pub send_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub sync_cron: String,
    pub freshness_cron: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub providers: Vec<ProviderConfig>,
    pub store: StoreConfig,
    pub publisher: PublisherConfig,
    pub scheduler: SchedulerConfig,
    pub logging_level: String,
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables. Panics with a clear
    /// message if a required var is missing.
    pub fn from_env() -> Self {
        let provider_names: Vec<String> = env::var("PROVIDERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let providers = provider_names
            .iter()
            .map(|name| provider_from_env(name))
            .collect();

        Self {
            providers,
            store: StoreConfig {
                database_url: required_env("DATABASE_URL"),
                min_pool: env_or("STORE_MIN_POOL", 2),
                max_pool: env_or("STORE_MAX_POOL", 20),
                upsert_batch_size: env_or("STORE_UPSERT_BATCH_SIZE", 500),
            },
            publisher: PublisherConfig {
                endpoint: env::var("PUBLISHER_ENDPOINT").unwrap_or_default(),
                cb_threshold: env_or("PUBLISHER_CB_THRESHOLD", 3),
                cb_open: Duration::from_secs(env_or("PUBLISHER_CB_OPEN_S", 30)),
                spill_capacity: env_or("PUBLISHER_SPILL_CAPACITY", 1000),
                send_timeout: Duration::from_secs(env_or("PUBLISHER_SEND_TIMEOUT_S", 5)),
            },
            scheduler: SchedulerConfig {
                sync_cron: env::var("SYNC_CRON").unwrap_or_else(|_| "*/5 * * * *".to_string()),
                freshness_cron: env::var("FRESHNESS_CRON")
                    .unwrap_or_else(|_| "0 2 * * *".to_string()),
            },
            logging_level: env::var("LOGGING_LEVEL").unwrap_or_else(|_| "info".to_string()),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env_or("WEB_PORT", 8080),
        }
    }

    /// Log non-sensitive config at startup.
    pub fn log_summary(&self) {
        tracing::info!(
            providers = self.providers.len(),
            sync_cron = %self.scheduler.sync_cron,
            freshness_cron = %self.scheduler.freshness_cron,
            max_pool = self.store.max_pool,
            "Loaded configuration"
        );
        for p in &self.providers {
            tracing::info!(
                provider = %p.name,
                base_url = %p.base_url,
                timeout_s = p.timeout.as_secs(),
                retry_count = p.retry_count,
                "Provider configured"
            );
        }
    }
}

fn provider_from_env(name: &str) -> ProviderConfig {
    let upper = name.to_uppercase().replace(['-', '.'], "_");
    ProviderConfig {
        name: name.to_string(),
        base_url: required_env(&format!("PROVIDER_{upper}_BASE_URL")),
        timeout: Duration::from_secs(env_or(&format!("PROVIDER_{upper}_TIMEOUT_S"), 10)),
        retry_count: env_or(&format!("PROVIDER_{upper}_RETRY_COUNT"), 3),
        retry_base: Duration::from_secs(env_or(&format!("PROVIDER_{upper}_RETRY_BASE_S"), 2)),
        cb_threshold: env_or(&format!("PROVIDER_{upper}_CB_THRESHOLD"), 5),
        cb_open: Duration::from_secs(env_or(&format!("PROVIDER_{upper}_CB_OPEN_S"), 30)),
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
