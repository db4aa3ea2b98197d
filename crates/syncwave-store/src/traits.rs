use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use syncwave_model::{ChangeLogEntry, ContentRecord, SyncBatch};

use crate::error::Result;

/// Counters + per-row diagnostics for a bulk write. Mirrors the
/// `(total, success, failed, rows_affected, elapsed)` shape the spec
/// names for `bulk_upsert`/`bulk_update_scores`.
#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub rows_affected: u64,
    pub elapsed: Duration,
    /// `(content_id, error message)` for every row a sub-batch rejected.
    pub failed_ids: Vec<(String, String)>,
}

impl BulkResult {
    pub fn merge(&mut self, other: BulkResult) {
        self.total += other.total;
        self.success += other.success;
        self.failed += other.failed;
        self.rows_affected += other.rows_affected;
        self.elapsed += other.elapsed;
        self.failed_ids.extend(other.failed_ids);
    }
}

/// Status a scheduler job was last observed finishing in, persisted so a
/// restart doesn't lose the distinction between "never run" and "last run
/// failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::Failed => "failed",
        }
    }
}

/// The capability the orchestrator, freshness job, and scheduler depend on.
/// The core never talks to `sqlx::PgPool` directly outside this crate's
/// concrete implementation, so every caller is testable against an
/// in-memory fake.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Missing ids are simply omitted; order is unspecified.
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ContentRecord>>;

    /// Every record whose `published_at` date falls in `dates`. Used by the
    /// freshness job, which only ever asks for the three threshold dates.
    async fn get_by_publish_dates(&self, dates: &[NaiveDate]) -> Result<Vec<ContentRecord>>;

    /// Splits `records` into sub-batches of at most `batch_size`, each in
    /// its own transaction. A failed sub-batch does not roll back any
    /// sub-batch already committed.
    async fn bulk_upsert(&self, records: Vec<ContentRecord>, batch_size: usize) -> Result<BulkResult>;

    /// Updates `score`/`updated_at`/`version` only; never touches
    /// `content_hash`.
    async fn bulk_update_scores(
        &self,
        updates: Vec<(String, Decimal)>,
        version_bump: bool,
    ) -> Result<BulkResult>;

    /// Single-transaction append; never updated or deleted afterwards.
    async fn append_change_logs(&self, entries: Vec<ChangeLogEntry>) -> Result<()>;

    /// Idempotent on `id` — safe to call more than once for the same batch.
    async fn save_sync_batch(&self, batch: &SyncBatch) -> Result<()>;

    /// Total row count, for paging `recalculate_all`.
    async fn count_all(&self) -> Result<i64>;

    /// One page of the full store, ordered by `id` for stable paging.
    /// Backing operation for the operational `recalculate_all` recovery
    /// path — explicitly expensive over the whole table, never on a cron.
    async fn get_page(&self, offset: i64, limit: i64) -> Result<Vec<ContentRecord>>;

    /// Cross-process mutual exclusion for `run_once`/`update_daily_scores`.
    /// Backed by `pg_try_advisory_lock`; returns `false` without blocking
    /// if another process already holds it.
    async fn try_acquire_job_lock(&self, job_name: &str) -> Result<bool>;

    async fn release_job_lock(&self, job_name: &str) -> Result<()>;

    /// Persisted scheduler state so a process restart doesn't immediately
    /// double-fire a job whose cadence would otherwise appear overdue.
    async fn mark_job_fired(&self, job_name: &str, at: DateTime<Utc>, outcome: JobOutcome) -> Result<()>;

    async fn last_fired_at(&self, job_name: &str) -> Result<Option<DateTime<Utc>>>;

    /// Cheap liveness probe for the health surface.
    async fn ping(&self) -> Result<()>;
}
