//! Event Publisher: posts the batched change event the orchestrator and
//! freshness job produce, with circuit breaking and local spill when the
//! bus is unreachable. Fire-and-forget from the caller's perspective.

mod circuit_breaker;
pub mod error;
pub mod publisher;
pub mod spill;
pub mod testing;

pub use error::PublishError;
pub use publisher::{EventPublisher, HttpEventPublisher, PublishOutcome};
pub use spill::SpillLog;
