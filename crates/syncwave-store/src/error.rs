use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),

    #[error("transient store error: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("constraint violation on row {content_id}: {source}")]
    RowRejected {
        content_id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown content type '{0}' in stored row")]
    UnknownContentType(String),
}

impl StoreError {
    /// Classifies a raw sqlx error the way the spec's error taxonomy (§7)
    /// requires: connection-level failures are transient and should cause
    /// the orchestrator to retry the whole cycle, constraint violations are
    /// row-level and should only fail that row.
    pub fn from_sqlx(content_id: &str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => StoreError::RowRejected {
                content_id: content_id.to_string(),
                source: err,
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::RowRejected {
                content_id: content_id.to_string(),
                source: err,
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unreachable(err),
            _ => StoreError::Transient(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
