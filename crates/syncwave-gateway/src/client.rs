use async_trait::async_trait;
use syncwave_model::CanonicalContent;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// A single external provider adapter. Fetching the raw document and mapping
/// it into `CanonicalContent` is out of scope for the core — implementers
/// of this trait live alongside the HTTP/XML/JSON mappers, not in this
/// crate. The gateway only adds the uniform retry/timeout/circuit-break
/// policy around whatever this trait does.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<CanonicalContent>, ProviderError>;
}

/// Carries the cancellation signal shared by one `fetch_all` call. Cloning
/// shares the same underlying token, so cancelling any clone cancels all of
/// them.
#[derive(Clone, Default)]
pub struct FetchContext {
    cancellation: CancellationToken,
}

impl FetchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
