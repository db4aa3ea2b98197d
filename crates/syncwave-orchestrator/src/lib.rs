//! Sync Orchestrator, Freshness Job, and Scheduler: the pieces that compose
//! the Gateway, Detector, Scorer, Store, and Publisher into one recurring
//! pipeline.

pub mod error;
pub mod freshness;
pub mod result;
pub mod scheduler;
pub mod sync;

/// Job name `run_once` is persisted/locked under — shared by the
/// orchestrator (store-side advisory lock), the scheduler (persisted
/// last-fired state), and their respective tests.
pub const SYNC_JOB_NAME: &str = "run_once";

/// Job name `update_daily_scores`/`recalculate_all` are persisted/locked
/// under. Both freshness operations share one lock: they must not run
/// concurrently with each other, only with `run_once`.
pub const FRESHNESS_JOB_NAME: &str = "update_daily_scores";

pub use error::OrchestratorError;
pub use freshness::FreshnessJob;
pub use result::{ScoreUpdateResult, SyncResult};
pub use scheduler::Scheduler;
pub use sync::SyncOrchestrator;
