use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("provider {provider} timed out after {timeout_s}s")]
    Timeout { provider: String, timeout_s: u64 },

    #[error("provider {provider} request failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("circuit open for provider {provider}, probe not yet due")]
    CircuitOpen { provider: String },

    #[error("fetch for provider {provider} was cancelled")]
    Cancelled { provider: String },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Timeout { provider, .. } => provider,
            ProviderError::RequestFailed { provider, .. } => provider,
            ProviderError::CircuitOpen { provider } => provider,
            ProviderError::Cancelled { provider } => provider,
        }
    }

    /// Circuit-open and cancellation are not counted against the breaker —
    /// they did not represent a real call to the provider.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. } | ProviderError::RequestFailed { .. }
        )
    }
}
