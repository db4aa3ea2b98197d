use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex as AsyncMutex;

use syncwave_events::{EventPublisher, PublishOutcome};
use syncwave_model::{BatchChangeEvent, EventChangeType};
use syncwave_store::ContentStore;

use crate::error::{OrchestratorError, Result};
use crate::result::ScoreUpdateResult;

/// Threshold under which a recomputed score is considered unchanged, per
/// the spec's `|new_score - old_score| > 0.01` rule.
const SCORE_EPSILON: &str = "0.01";

/// Identifies threshold-crossing rows, rescores, bulk-updates, publishes.
/// Does not exclude `SyncOrchestrator::run_once` — the two write sets only
/// overlap on `score`/`updated_at`/`version`, and last-writer-wins at the
/// row level is acceptable there.
pub struct FreshnessJob {
    store: Arc<dyn ContentStore>,
    publisher: Arc<dyn EventPublisher>,
    running: AsyncMutex<()>,
}

impl FreshnessJob {
    pub fn new(store: Arc<dyn ContentStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            publisher,
            running: AsyncMutex::new(()),
        }
    }

    /// Threshold dates for `today`: exactly the three ages that change a
    /// record's recency contribution (spec.md §4.8).
    pub fn threshold_dates(today: NaiveDate) -> [NaiveDate; 3] {
        [today - chrono::Duration::days(7), today - chrono::Duration::days(30), today - chrono::Duration::days(90)]
    }

    /// Store-side advisory lock shared by both freshness operations, so a
    /// `recalculate_all` recovery run and a scheduled `update_daily_scores`
    /// never interleave against each other across processes. They don't
    /// need to exclude `run_once`, which locks under `crate::SYNC_JOB_NAME`
    /// instead.
    pub async fn update_daily_scores(&self, today: NaiveDate) -> Result<ScoreUpdateResult> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| OrchestratorError::AlreadyRunning)?;

        if !self.store.try_acquire_job_lock(crate::FRESHNESS_JOB_NAME).await? {
            return Err(OrchestratorError::AlreadyRunning);
        }

        let result = self.update_daily_scores_locked(today).await;

        if let Err(e) = self.store.release_job_lock(crate::FRESHNESS_JOB_NAME).await {
            tracing::error!(error = %e, "failed to release update_daily_scores advisory lock");
        }

        result
    }

    async fn update_daily_scores_locked(&self, today: NaiveDate) -> Result<ScoreUpdateResult> {
        let dates = Self::threshold_dates(today);
        let candidates = self.store.get_by_publish_dates(&dates).await?;
        self.rescore_and_publish(candidates, Utc::now(), Some("freshness")).await
    }

    /// Operational recovery path: iterates the entire store and rescores
    /// every record. Explicitly expensive — never invoked on a cron.
    pub async fn recalculate_all(&self, page_size: i64) -> Result<ScoreUpdateResult> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| OrchestratorError::AlreadyRunning)?;

        if !self.store.try_acquire_job_lock(crate::FRESHNESS_JOB_NAME).await? {
            return Err(OrchestratorError::AlreadyRunning);
        }

        let result = self.recalculate_all_locked(page_size).await;

        if let Err(e) = self.store.release_job_lock(crate::FRESHNESS_JOB_NAME).await {
            tracing::error!(error = %e, "failed to release update_daily_scores advisory lock");
        }

        result
    }

    async fn recalculate_all_locked(&self, page_size: i64) -> Result<ScoreUpdateResult> {
        let total = self.store.count_all().await?;
        let mut offset = 0i64;
        let mut aggregate = ScoreUpdateResult::default();
        let now = Utc::now();

        while offset < total {
            let page = self.store.get_page(offset, page_size).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len() as i64;
            let partial = self.rescore_and_publish(page, now, Some("freshness-recalculate")).await?;
            aggregate.candidates_examined += partial.candidates_examined;
            aggregate.updated += partial.updated;
            aggregate.rows_affected += partial.rows_affected;
            aggregate.failed_ids.extend(partial.failed_ids);
            offset += page_len;
        }

        Ok(aggregate)
    }

    async fn rescore_and_publish(
        &self,
        candidates: Vec<syncwave_model::ContentRecord>,
        now: DateTime<Utc>,
        source_provider: Option<&str>,
    ) -> Result<ScoreUpdateResult> {
        let epsilon: Decimal = SCORE_EPSILON.parse().expect("valid decimal literal");

        let mut result = ScoreUpdateResult {
            candidates_examined: candidates.len() as i64,
            ..Default::default()
        };

        let mut updates = Vec::new();
        for record in &candidates {
            let new_score = syncwave_scorer::score(record, now);
            if (new_score - record.score).abs() > epsilon {
                updates.push((record.id().to_string(), new_score));
            }
        }

        result.updated = updates.len() as i64;

        if !updates.is_empty() {
            let ids: Vec<String> = updates.iter().map(|(id, _)| id.clone()).collect();
            let bulk = self.store.bulk_update_scores(updates, true).await?;
            result.rows_affected = bulk.rows_affected as i64;
            result.failed_ids = bulk.failed_ids;

            let event = BatchChangeEvent::new(
                uuid::Uuid::new_v4(),
                ids,
                EventChangeType::ScoreUpdated,
                source_provider.map(|s| s.to_string()),
                now,
            );
            match self.publisher.publish(event).await {
                PublishOutcome::Delivered => {}
                PublishOutcome::Buffered => tracing::info!("score-updated event buffered, bus unavailable"),
                PublishOutcome::Dropped => tracing::warn!("score-updated event dropped"),
            }
        }

        Ok(result)
    }
}
