use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use syncwave_common::config::ProviderConfig;
use syncwave_model::CanonicalContent;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::circuit_breaker::{Admission, CircuitBreaker};
use crate::client::{FetchContext, ProviderClient};
use crate::error::ProviderError;

struct ManagedProvider {
    client: Arc<dyn ProviderClient>,
    config: ProviderConfig,
    breaker: Mutex<CircuitBreaker>,
}

/// Parallel fetch across every configured provider, each behind its own
/// timeout/retry/circuit-break policy. A failing provider never cancels its
/// peers; its slot carries an error and the rest of the cycle proceeds in
/// degraded mode.
///
/// Outlives a single `fetch_all` call — the orchestrator (or the server's
/// construction root) holds one `ProviderGateway` for the process lifetime
/// so circuit state persists across cycles.
pub struct ProviderGateway {
    providers: Vec<ManagedProvider>,
}

impl ProviderGateway {
    pub fn new(providers: Vec<(Arc<dyn ProviderClient>, ProviderConfig)>) -> Self {
        let providers = providers
            .into_iter()
            .map(|(client, config)| ManagedProvider {
                breaker: Mutex::new(CircuitBreaker::new(config.cb_threshold, config.cb_open)),
                client,
                config,
            })
            .collect();
        Self { providers }
    }

    /// Issues requests to all configured providers concurrently, returning
    /// once every one has either produced a result or exhausted its retry
    /// budget. The returned map is unordered — callers must not depend on
    /// iteration order.
    pub async fn fetch_all(
        &self,
        ctx: &FetchContext,
    ) -> HashMap<String, Result<Vec<CanonicalContent>, ProviderError>> {
        let tasks = self.providers.iter().map(|provider| fetch_one(provider, ctx));
        join_all(tasks).await.into_iter().collect()
    }
}

async fn fetch_one(
    provider: &ManagedProvider,
    ctx: &FetchContext,
) -> (String, Result<Vec<CanonicalContent>, ProviderError>) {
    let provider_id = provider.client.provider_id().to_string();

    let admission = provider.breaker.lock().await.admit();
    if admission == Admission::Rejected {
        tracing::warn!(provider = %provider_id, "circuit open, skipping fetch");
        return (
            provider_id.clone(),
            Err(ProviderError::CircuitOpen { provider: provider_id }),
        );
    }

    let result = fetch_with_retry(provider, ctx, &provider_id).await;

    let mut breaker = provider.breaker.lock().await;
    match &result {
        Ok(_) => breaker.record_success(),
        Err(e) if e.counts_as_failure() => breaker.record_failure(),
        Err(_) => {}
    }
    drop(breaker);

    (provider_id, result)
}

async fn fetch_with_retry(
    provider: &ManagedProvider,
    ctx: &FetchContext,
    provider_id: &str,
) -> Result<Vec<CanonicalContent>, ProviderError> {
    let cancellation = ctx.cancellation();
    let mut attempt = 0;

    loop {
        if cancellation.is_cancelled() {
            return Err(ProviderError::Cancelled {
                provider: provider_id.to_string(),
            });
        }

        let call = timeout(provider.config.timeout, provider.client.fetch());
        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                return Err(ProviderError::Cancelled { provider: provider_id.to_string() });
            }
            result = call => result,
        };

        let last_error = match outcome {
            Ok(Ok(contents)) => return Ok(contents),
            Ok(Err(provider_error)) => provider_error,
            Err(_elapsed) => ProviderError::Timeout {
                provider: provider_id.to_string(),
                timeout_s: provider.config.timeout.as_secs(),
            },
        };

        if attempt >= provider.config.retry_count {
            tracing::warn!(provider = %provider_id, attempt, error = %last_error, "retry budget exhausted");
            return Err(last_error);
        }

        tracing::warn!(provider = %provider_id, attempt, error = %last_error, "provider fetch failed, retrying");

        let backoff = backoff_with_jitter(provider.config.retry_base, attempt);
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                return Err(ProviderError::Cancelled { provider: provider_id.to_string() });
            }
            _ = tokio::time::sleep(backoff) => {}
        }

        attempt += 1;
    }
}

fn backoff_with_jitter(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(1u32 << attempt.min(16));
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis().max(1) as u64);
    exponential + Duration::from_millis(jitter_ms)
}
