use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("bus send failed: {0}")]
    SendFailed(String),

    #[error("bus send timed out after {0:?}")]
    Timeout(std::time::Duration),
}
