use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio_util::sync::CancellationToken;

use syncwave_gateway::FetchContext;
use syncwave_store::{ContentStore, JobOutcome};

use crate::freshness::FreshnessJob;
use crate::sync::SyncOrchestrator;
use crate::{FRESHNESS_JOB_NAME, SYNC_JOB_NAME};

/// The `cron` crate requires a leading seconds field; the configuration
/// surface (spec.md §6) documents the standard 5-field `minute hour
/// day-of-month month day-of-week` form, so a bare "0 " is prepended when
/// the caller didn't already supply one.
fn with_seconds_field(expression: &str) -> String {
    if expression.split_whitespace().count() <= 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

/// Cron-driven invoker of [`SyncOrchestrator::run_once`] and
/// [`FreshnessJob::update_daily_scores`]. A job whose previous invocation
/// is still running is skipped, not queued. Fires are evaluated in UTC;
/// there is no daylight-saving adjustment to get wrong.
pub struct Scheduler {
    sync_schedule: Schedule,
    freshness_schedule: Schedule,
    orchestrator: Arc<SyncOrchestrator>,
    freshness: Arc<FreshnessJob>,
    store: Arc<dyn ContentStore>,
    sync_in_flight: AtomicBool,
    freshness_in_flight: AtomicBool,
    first_tick_done: AtomicBool,
}

impl Scheduler {
    pub fn new(
        sync_cron: &str,
        freshness_cron: &str,
        orchestrator: Arc<SyncOrchestrator>,
        freshness: Arc<FreshnessJob>,
        store: Arc<dyn ContentStore>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            sync_schedule: Schedule::from_str(&with_seconds_field(sync_cron))?,
            freshness_schedule: Schedule::from_str(&with_seconds_field(freshness_cron))?,
            orchestrator,
            freshness,
            store,
            sync_in_flight: AtomicBool::new(false),
            freshness_in_flight: AtomicBool::new(false),
            first_tick_done: AtomicBool::new(false),
        })
    }

    /// Whether the run loop has processed at least one tick. The health
    /// surface's `/health/ready` uses this to distinguish "still booting"
    /// from "degraded" once the process is actually wired up and polling.
    pub fn has_completed_first_tick(&self) -> bool {
        self.first_tick_done.load(Ordering::SeqCst)
    }

    /// Runs until `cancellation` fires. Polls once a second — coarse enough
    /// to be cheap, fine enough that no cron tick is missed by more than a
    /// second.
    pub async fn run(&self, cancellation: CancellationToken) {
        // Restart-safety: consult the persisted last-fired instant so a
        // process bounce doesn't treat an overdue-looking job as due
        // immediately. `cron`'s `after` iterator already only yields
        // strictly-future ticks relative to whatever instant we seed it
        // with, so seeding with the persisted last fire (when present)
        // gives the same behaviour as if the process never restarted.
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    tracing::info!("scheduler shutting down");
                    return;
                }
                _ = tick.tick() => {
                    let now = Utc::now();
                    if self.is_due(&self.sync_schedule, SYNC_JOB_NAME, now).await {
                        self.fire_sync().await;
                    }
                    if self.is_due(&self.freshness_schedule, FRESHNESS_JOB_NAME, now).await {
                        self.fire_freshness(now).await;
                    }
                    self.first_tick_done.store(true, Ordering::SeqCst);
                }
            }
        }
    }

    async fn is_due(&self, schedule: &Schedule, job_name: &str, now: chrono::DateTime<Utc>) -> bool {
        let last_fired = self.store.last_fired_at(job_name).await.ok().flatten();
        let reference = last_fired.unwrap_or(now - chrono::Duration::seconds(1));
        match schedule.after(&reference).next() {
            Some(next_due) => next_due <= now,
            None => false,
        }
    }

    async fn fire_sync(&self) {
        if self
            .sync_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(job = SYNC_JOB_NAME, "previous invocation still running, skipping this tick");
            return;
        }

        let result = self.orchestrator.run_once(&FetchContext::new()).await;
        let outcome = match &result {
            Ok(r) if r.succeeded => JobOutcome::Succeeded,
            _ => JobOutcome::Failed,
        };
        if let Err(e) = self.store.mark_job_fired(SYNC_JOB_NAME, Utc::now(), outcome).await {
            tracing::error!(error = %e, "failed to persist scheduler state for run_once");
        }
        if let Err(e) = result {
            tracing::error!(error = %e, "run_once cycle errored");
        }
        self.sync_in_flight.store(false, Ordering::SeqCst);
    }

    async fn fire_freshness(&self, now: chrono::DateTime<Utc>) {
        if self
            .freshness_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(job = FRESHNESS_JOB_NAME, "previous invocation still running, skipping this tick");
            return;
        }

        let result = self.freshness.update_daily_scores(now.date_naive()).await;
        let outcome = if result.is_ok() { JobOutcome::Succeeded } else { JobOutcome::Failed };
        if let Err(e) = self.store.mark_job_fired(FRESHNESS_JOB_NAME, now, outcome).await {
            tracing::error!(error = %e, "failed to persist scheduler state for update_daily_scores");
        }
        if let Err(e) = result {
            tracing::error!(error = %e, "update_daily_scores errored");
        }
        self.freshness_in_flight.store(false, Ordering::SeqCst);
    }
}
