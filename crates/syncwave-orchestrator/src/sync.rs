use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use syncwave_detector::detect;
use syncwave_events::{EventPublisher, PublishOutcome};
use syncwave_gateway::{FetchContext, ProviderGateway};
use syncwave_model::{
    classify, BatchChangeEvent, ChangeLogEntry, ChangeType, ContentRecord, SyncBatch,
};
use syncwave_store::ContentStore;

use crate::error::{OrchestratorError, Result};
use crate::result::SyncResult;

/// Composes Gateway → Detector → Scorer → Store → Publisher for one cycle.
/// At most one `run_once` may be in flight per process; a second caller
/// while one is running gets [`OrchestratorError::AlreadyRunning`] rather
/// than queuing behind it (the scheduler is expected to skip, not queue,
/// per the spec's scheduling invariant).
pub struct SyncOrchestrator {
    gateway: Arc<ProviderGateway>,
    store: Arc<dyn ContentStore>,
    publisher: Arc<dyn EventPublisher>,
    running: AsyncMutex<()>,
    upsert_batch_size: usize,
}

impl SyncOrchestrator {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        store: Arc<dyn ContentStore>,
        publisher: Arc<dyn EventPublisher>,
        upsert_batch_size: usize,
    ) -> Self {
        Self {
            gateway,
            store,
            publisher,
            running: AsyncMutex::new(()),
            upsert_batch_size,
        }
    }

    /// One cycle: fetch, detect, score, persist, publish. Returns a
    /// `SyncResult` even when the cycle fails outright (all providers
    /// down) — only lock contention raises an error, matching the spec's
    /// rule that publish/store/provider failures never escape as errors
    /// from the orchestrator's public surface.
    ///
    /// Mutual exclusion is two-layered: the in-process `running` guard
    /// rejects a concurrent caller in this same program immediately, then
    /// the store's advisory lock (`crate::SYNC_JOB_NAME`) rejects a
    /// concurrent cycle running in a sibling process. The advisory lock is
    /// released on every exit path via `run_cycle`'s single call site below.
    pub async fn run_once(&self, ctx: &FetchContext) -> Result<SyncResult> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| OrchestratorError::AlreadyRunning)?;

        if !self.store.try_acquire_job_lock(crate::SYNC_JOB_NAME).await? {
            return Err(OrchestratorError::AlreadyRunning);
        }

        let result = self.run_cycle(ctx).await;

        if let Err(e) = self.store.release_job_lock(crate::SYNC_JOB_NAME).await {
            tracing::error!(error = %e, "failed to release run_once advisory lock");
        }

        result
    }

    async fn run_cycle(&self, ctx: &FetchContext) -> Result<SyncResult> {
        let started_at = Utc::now();
        let mut batch = SyncBatch::start(Vec::new(), started_at);
        self.store.save_sync_batch(&batch).await?;

        let fetches = self.gateway.fetch_all(ctx).await;

        let mut incoming = Vec::new();
        let mut providers_failed = Vec::new();
        let mut providers_succeeded = Vec::new();
        for (provider_id, outcome) in fetches {
            match outcome {
                Ok(items) => {
                    providers_succeeded.push(provider_id);
                    incoming.extend(items);
                }
                Err(e) => {
                    tracing::warn!(provider = %provider_id, error = %e, "provider fetch failed for this cycle");
                    providers_failed.push(provider_id);
                }
            }
        }
        batch.source_providers = providers_succeeded.clone();

        if providers_succeeded.is_empty() && !providers_failed.is_empty() {
            let now = Utc::now();
            batch.fail(now, "all providers failed");
            self.store.save_sync_batch(&batch).await?;
            return Ok(SyncResult {
                sync_batch_id: Some(batch.id),
                providers_failed,
                succeeded: false,
                error_message: Some("all providers failed".to_string()),
                ..Default::default()
            });
        }

        let items_fetched = incoming.len() as i64;
        let now = Utc::now();
        let incoming_records: Vec<ContentRecord> = incoming
            .into_iter()
            .map(|content| ContentRecord::new_unscored(content, now))
            .collect();

        let ids: Vec<String> = incoming_records.iter().map(|r| r.id().to_string()).collect();
        let existing = self.store.get_by_ids(&ids).await?;

        let mut classified = detect(incoming_records, existing);

        let mut items_created = 0i64;
        let mut items_updated = 0i64;
        let mut items_unchanged = 0i64;
        let mut to_upsert = Vec::new();
        let mut change_logs = Vec::new();

        for result in classified.iter_mut() {
            match result.change_type {
                ChangeType::Unchanged => {
                    items_unchanged += 1;
                    continue;
                }
                ChangeType::Created => items_created += 1,
                ChangeType::Updated => items_updated += 1,
            }

            let previous_score = result.previous.as_ref().map(|p| p.score);
            let new_score = syncwave_scorer::score(&result.incoming, now);
            result.incoming.score = new_score;

            if let Some(previous_score) = previous_score {
                if previous_score != new_score {
                    result.changed_fields.push(syncwave_model::FieldDelta::new(
                        "score",
                        serde_json::json!(previous_score.to_string()),
                        serde_json::json!(new_score.to_string()),
                    ));
                }
            }

            to_upsert.push(result.incoming.clone());
            change_logs.push(ChangeLogEntry::from_change_result(result, batch.id, now));
        }

        let mut rows_affected = 0i64;
        let mut failed_ids = Vec::new();
        if !to_upsert.is_empty() {
            let upsert_result = self.store.bulk_upsert(to_upsert, self.upsert_batch_size).await?;
            rows_affected += upsert_result.rows_affected as i64;
            failed_ids.extend(upsert_result.failed_ids);

            self.store.append_change_logs(change_logs).await?;
        }

        batch.items_fetched = items_fetched;
        batch.items_created = items_created;
        batch.items_updated = items_updated;
        batch.items_unchanged = items_unchanged;
        batch.rows_affected = rows_affected;
        batch.succeed(Utc::now());
        self.store.save_sync_batch(&batch).await?;

        let created_empty = items_created == 0;
        let updated_empty = items_updated == 0;
        if let Some(event_change_type) = classify(created_empty, updated_empty) {
            let content_ids: Vec<String> = classified
                .iter()
                .filter(|r| r.needs_scoring())
                .map(|r| r.incoming.id().to_string())
                .collect();

            let source_provider = if providers_succeeded.len() == 1 {
                Some(providers_succeeded[0].clone())
            } else {
                None
            };

            let event = BatchChangeEvent::new(batch.id, content_ids, event_change_type, source_provider, Utc::now());

            match self.publisher.publish(event).await {
                PublishOutcome::Delivered => {}
                PublishOutcome::Buffered => tracing::info!(batch_id = %batch.id, "change event buffered, bus unavailable"),
                PublishOutcome::Dropped => tracing::warn!(batch_id = %batch.id, "change event dropped"),
            }
        }

        Ok(SyncResult {
            sync_batch_id: Some(batch.id),
            items_fetched,
            items_created,
            items_updated,
            items_unchanged,
            rows_affected,
            failed_ids,
            providers_failed,
            succeeded: true,
            error_message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use syncwave_events::testing::FakePublisher;
    use syncwave_gateway::{ProviderClient, ProviderError};
    use syncwave_model::content::{VideoContent, VideoMetrics};
    use syncwave_model::CanonicalContent;
    use syncwave_store::testing::FakeStore;

    struct StaticProvider {
        id: String,
        items: Vec<CanonicalContent>,
    }

    #[async_trait]
    impl ProviderClient for StaticProvider {
        fn provider_id(&self) -> &str {
            &self.id
        }

        async fn fetch(&self) -> std::result::Result<Vec<CanonicalContent>, ProviderError> {
            Ok(self.items.clone())
        }
    }

    struct FailingProvider {
        id: String,
    }

    #[async_trait]
    impl ProviderClient for FailingProvider {
        fn provider_id(&self) -> &str {
            &self.id
        }

        async fn fetch(&self) -> std::result::Result<Vec<CanonicalContent>, ProviderError> {
            Err(ProviderError::RequestFailed {
                provider: self.id.clone(),
                message: "down".into(),
            })
        }
    }

    fn video(id: &str, views: u64, now: chrono::DateTime<Utc>) -> CanonicalContent {
        CanonicalContent::Video(VideoContent {
            id: id.to_string(),
            title: "A".into(),
            published_at: now,
            categories: vec!["x".into()],
            source_provider: "p1".into(),
            metrics: VideoMetrics {
                views,
                likes: 100,
                duration: Duration::from_secs(600),
            },
        })
    }

    fn test_provider_config() -> syncwave_common::config::ProviderConfig {
        syncwave_common::config::ProviderConfig {
            name: "p1".into(),
            base_url: "http://example.invalid".into(),
            timeout: Duration::from_secs(1),
            retry_count: 0,
            retry_base: Duration::from_millis(1),
            cb_threshold: 5,
            cb_open: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn first_run_seeds_store_scores_and_publishes_created() {
        let now = chrono::Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap();
        use chrono::TimeZone;
        let published = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let _ = now;

        let provider = Arc::new(StaticProvider {
            id: "p1".into(),
            items: vec![video("p1_a", 2000, published)],
        });
        let gateway = Arc::new(ProviderGateway::new(vec![(provider, test_provider_config())]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());

        let orchestrator = SyncOrchestrator::new(gateway, store.clone(), publisher.clone(), 500);
        let result = orchestrator.run_once(&FetchContext::new()).await.unwrap();

        assert!(result.succeeded);
        assert_eq!(result.items_created, 1);
        assert_eq!(result.items_updated, 0);
        assert_eq!(publisher.published().len(), 1);
        assert_eq!(publisher.published()[0].change_type, syncwave_model::EventChangeType::Created);
    }

    #[tokio::test]
    async fn no_op_cycle_publishes_nothing() {
        use chrono::TimeZone;
        let published = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let provider = Arc::new(StaticProvider {
            id: "p1".into(),
            items: vec![video("p1_a", 2000, published)],
        });
        let gateway = Arc::new(ProviderGateway::new(vec![(provider, test_provider_config())]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());

        let orchestrator = SyncOrchestrator::new(gateway, store.clone(), publisher.clone(), 500);
        orchestrator.run_once(&FetchContext::new()).await.unwrap();
        let second = orchestrator.run_once(&FetchContext::new()).await.unwrap();

        assert_eq!(second.items_created, 0);
        assert_eq!(second.items_updated, 0);
        assert_eq!(second.items_unchanged, 1);
        assert_eq!(publisher.published().len(), 1, "only the first cycle should publish");
        assert_eq!(store.change_logs().len(), 1, "no new change log rows on the no-op cycle");
    }

    #[tokio::test]
    async fn partial_provider_failure_still_succeeds_with_remaining_data() {
        use chrono::TimeZone;
        let published = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let p1 = Arc::new(FailingProvider { id: "p1".into() });
        let p2 = Arc::new(StaticProvider {
            id: "p2".into(),
            items: vec![video("p2_a", 500, published)],
        });
        let mut p1_cfg = test_provider_config();
        p1_cfg.retry_count = 0;
        let mut p2_cfg = test_provider_config();
        p2_cfg.name = "p2".into();

        let gateway = Arc::new(ProviderGateway::new(vec![(p1, p1_cfg), (p2, p2_cfg)]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());

        let orchestrator = SyncOrchestrator::new(gateway, store.clone(), publisher.clone(), 500);
        let result = orchestrator.run_once(&FetchContext::new()).await.unwrap();

        assert!(result.succeeded);
        assert_eq!(result.providers_failed, vec!["p1".to_string()]);
        assert_eq!(result.items_created, 1);
        assert_eq!(publisher.published()[0].source_provider, Some("p2".to_string()));
    }

    #[tokio::test]
    async fn all_providers_failing_marks_batch_failed() {
        let p1 = Arc::new(FailingProvider { id: "p1".into() });
        let mut p1_cfg = test_provider_config();
        p1_cfg.retry_count = 0;
        let gateway = Arc::new(ProviderGateway::new(vec![(p1, p1_cfg)]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());

        let orchestrator = SyncOrchestrator::new(gateway, store.clone(), publisher.clone(), 500);
        let result = orchestrator.run_once(&FetchContext::new()).await.unwrap();

        assert!(!result.succeeded);
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn run_once_forwards_the_configured_upsert_batch_size() {
        use chrono::TimeZone;
        let published = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let provider = Arc::new(StaticProvider {
            id: "p1".into(),
            items: vec![video("p1_a", 2000, published)],
        });
        let gateway = Arc::new(ProviderGateway::new(vec![(provider, test_provider_config())]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());
        let orchestrator = SyncOrchestrator::new(gateway, store.clone(), publisher, 37);

        orchestrator.run_once(&FetchContext::new()).await.unwrap();
        assert_eq!(store.last_upsert_batch_size(), Some(37));
    }

    #[tokio::test]
    async fn run_once_is_rejected_when_another_process_holds_the_store_lock() {
        let provider = Arc::new(StaticProvider {
            id: "p1".into(),
            items: vec![],
        });
        let gateway = Arc::new(ProviderGateway::new(vec![(provider, test_provider_config())]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());
        let orchestrator = SyncOrchestrator::new(gateway, store.clone(), publisher, 500);

        // Simulate a sibling process already holding the advisory lock.
        assert!(store.try_acquire_job_lock(crate::SYNC_JOB_NAME).await.unwrap());

        let result = orchestrator.run_once(&FetchContext::new()).await;
        assert!(matches!(result, Err(OrchestratorError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn run_once_releases_the_store_lock_so_the_next_cycle_can_acquire_it() {
        let provider = Arc::new(StaticProvider {
            id: "p1".into(),
            items: vec![],
        });
        let gateway = Arc::new(ProviderGateway::new(vec![(provider, test_provider_config())]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());
        let orchestrator = SyncOrchestrator::new(gateway, store.clone(), publisher, 500);

        orchestrator.run_once(&FetchContext::new()).await.unwrap();

        // If the lock weren't released, this would fail to acquire.
        assert!(store.try_acquire_job_lock(crate::SYNC_JOB_NAME).await.unwrap());
        store.release_job_lock(crate::SYNC_JOB_NAME).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_run_once_is_rejected() {
        let provider = Arc::new(StaticProvider {
            id: "p1".into(),
            items: vec![],
        });
        let gateway = Arc::new(ProviderGateway::new(vec![(provider, test_provider_config())]));
        let store = Arc::new(FakeStore::new());
        let publisher = Arc::new(FakePublisher::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(gateway, store, publisher, 500));

        let guard = orchestrator.running.lock().await;
        let result = orchestrator.run_once(&FetchContext::new()).await;
        assert!(matches!(result, Err(OrchestratorError::AlreadyRunning)));
        drop(guard);
    }
}
