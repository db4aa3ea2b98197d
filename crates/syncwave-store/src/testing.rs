//! In-memory [`ContentStore`] used by orchestrator- and freshness-job-level
//! tests so they don't need a live Postgres.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use syncwave_model::{ChangeLogEntry, ContentRecord, SyncBatch};

use crate::error::Result;
use crate::traits::{BulkResult, ContentStore, JobOutcome};

#[derive(Default)]
pub struct FakeStore {
    contents: Mutex<HashMap<String, ContentRecord>>,
    change_logs: Mutex<Vec<ChangeLogEntry>>,
    sync_batches: Mutex<HashMap<uuid::Uuid, SyncBatch>>,
    job_locks: Mutex<HashMap<String, ()>>,
    job_state: Mutex<HashMap<String, (DateTime<Utc>, JobOutcome)>>,
    last_upsert_batch_size: Mutex<Option<usize>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: ContentRecord) {
        self.contents
            .lock()
            .unwrap()
            .insert(record.id().to_string(), record);
    }

    pub fn change_logs(&self) -> Vec<ChangeLogEntry> {
        self.change_logs.lock().unwrap().clone()
    }

    pub fn sync_batch(&self, id: uuid::Uuid) -> Option<SyncBatch> {
        self.sync_batches.lock().unwrap().get(&id).cloned()
    }

    pub fn all_records(&self) -> Vec<ContentRecord> {
        self.contents.lock().unwrap().values().cloned().collect()
    }

    /// The `batch_size` argument the most recent `bulk_upsert` call was
    /// made with, for tests asserting a configured value is actually
    /// threaded through rather than hardcoded by the caller.
    pub fn last_upsert_batch_size(&self) -> Option<usize> {
        *self.last_upsert_batch_size.lock().unwrap()
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ContentRecord>> {
        let contents = self.contents.lock().unwrap();
        Ok(ids.iter().filter_map(|id| contents.get(id).cloned()).collect())
    }

    async fn get_by_publish_dates(&self, dates: &[NaiveDate]) -> Result<Vec<ContentRecord>> {
        let contents = self.contents.lock().unwrap();
        Ok(contents
            .values()
            .filter(|r| dates.contains(&r.published_at().date_naive()))
            .cloned()
            .collect())
    }

    async fn bulk_upsert(&self, records: Vec<ContentRecord>, batch_size: usize) -> Result<BulkResult> {
        *self.last_upsert_batch_size.lock().unwrap() = Some(batch_size);
        let mut contents = self.contents.lock().unwrap();
        let mut result = BulkResult {
            total: records.len(),
            ..Default::default()
        };
        for mut record in records {
            let existing_version = contents.get(record.id()).map(|r| r.version);
            record.version = existing_version.unwrap_or(0) + 1;
            contents.insert(record.id().to_string(), record);
            result.success += 1;
            result.rows_affected += 1;
        }
        Ok(result)
    }

    async fn bulk_update_scores(
        &self,
        updates: Vec<(String, Decimal)>,
        version_bump: bool,
    ) -> Result<BulkResult> {
        let mut contents = self.contents.lock().unwrap();
        let mut result = BulkResult {
            total: updates.len(),
            ..Default::default()
        };
        for (id, score) in updates {
            if let Some(record) = contents.get_mut(&id) {
                record.score = score;
                record.updated_at = Utc::now();
                if version_bump {
                    record.version += 1;
                }
                result.success += 1;
                result.rows_affected += 1;
            } else {
                result.failed += 1;
                result.failed_ids.push((id, "not found".to_string()));
            }
        }
        Ok(result)
    }

    async fn append_change_logs(&self, entries: Vec<ChangeLogEntry>) -> Result<()> {
        self.change_logs.lock().unwrap().extend(entries);
        Ok(())
    }

    async fn save_sync_batch(&self, batch: &SyncBatch) -> Result<()> {
        self.sync_batches.lock().unwrap().insert(batch.id, batch.clone());
        Ok(())
    }

    async fn count_all(&self) -> Result<i64> {
        Ok(self.contents.lock().unwrap().len() as i64)
    }

    async fn get_page(&self, offset: i64, limit: i64) -> Result<Vec<ContentRecord>> {
        let mut records: Vec<_> = self.contents.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn try_acquire_job_lock(&self, job_name: &str) -> Result<bool> {
        let mut locks = self.job_locks.lock().unwrap();
        if locks.contains_key(job_name) {
            Ok(false)
        } else {
            locks.insert(job_name.to_string(), ());
            Ok(true)
        }
    }

    async fn release_job_lock(&self, job_name: &str) -> Result<()> {
        self.job_locks.lock().unwrap().remove(job_name);
        Ok(())
    }

    async fn mark_job_fired(&self, job_name: &str, at: DateTime<Utc>, outcome: JobOutcome) -> Result<()> {
        self.job_state.lock().unwrap().insert(job_name.to_string(), (at, outcome));
        Ok(())
    }

    async fn last_fired_at(&self, job_name: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.job_state.lock().unwrap().get(job_name).map(|(at, _)| *at))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwave_model::content::{VideoContent, VideoMetrics};
    use syncwave_model::CanonicalContent;

    fn video(id: &str, now: DateTime<Utc>) -> ContentRecord {
        let content = CanonicalContent::Video(VideoContent {
            id: id.to_string(),
            title: "A".into(),
            published_at: now,
            categories: vec!["x".into()],
            source_provider: "p1".into(),
            metrics: VideoMetrics {
                views: 100,
                likes: 10,
                duration: std::time::Duration::from_secs(60),
            },
        });
        ContentRecord::new_unscored(content, now)
    }

    #[tokio::test]
    async fn job_lock_is_exclusive_until_released() {
        let store = FakeStore::new();
        assert!(store.try_acquire_job_lock("sync").await.unwrap());
        assert!(!store.try_acquire_job_lock("sync").await.unwrap());
        store.release_job_lock("sync").await.unwrap();
        assert!(store.try_acquire_job_lock("sync").await.unwrap());
    }

    #[tokio::test]
    async fn bulk_upsert_then_get_by_ids_round_trips() {
        let store = FakeStore::new();
        let now = Utc::now();
        store
            .bulk_upsert(vec![video("p1_a", now)], 500)
            .await
            .unwrap();
        let found = store.get_by_ids(&["p1_a".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, 1);
    }
}
