//! The Store: the sole owner of persisted `ContentRecord`/`ChangeLogEntry`/
//! `SyncBatch` state. Every other component holds value copies; nothing
//! outside this crate talks to `sqlx::PgPool` directly.

pub mod error;
pub mod postgres;
pub mod rows;
pub mod testing;
pub mod traits;

pub use error::{Result, StoreError};
pub use postgres::PgStore;
pub use traits::{BulkResult, ContentStore, JobOutcome};
