use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("a sync cycle is already in progress for this process")]
    AlreadyRunning,

    #[error("all providers failed for this cycle")]
    AllProvidersFailed,

    #[error("store error: {0}")]
    Store(#[from] syncwave_store::StoreError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
