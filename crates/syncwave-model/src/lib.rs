pub mod batch;
pub mod change;
pub mod content;
pub mod event;
pub mod fingerprint;
pub mod record;

pub use batch::{BatchStatus, SyncBatch};
pub use change::{ChangeLogEntry, ChangeResult, ChangeType, FieldDelta};
pub use content::{iso8601_duration, CanonicalContent, ContentMetrics, ContentType};
pub use event::{classify, BatchChangeEvent, EventChangeType};
pub use fingerprint::fingerprint;
pub use record::ContentRecord;
