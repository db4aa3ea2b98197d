use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Succeeded,
    Failed,
}

/// Persisted record of one `run_once` cycle. Created at cycle start with
/// `status = Running`, closed exactly once at cycle end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBatch {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    pub source_providers: Vec<String>,
    pub items_fetched: i64,
    pub items_created: i64,
    pub items_updated: i64,
    pub items_unchanged: i64,
    pub rows_affected: i64,
    pub error_message: Option<String>,
}

impl SyncBatch {
    pub fn start(source_providers: Vec<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            completed_at: None,
            status: BatchStatus::Running,
            source_providers,
            items_fetched: 0,
            items_created: 0,
            items_updated: 0,
            items_unchanged: 0,
            rows_affected: 0,
            error_message: None,
        }
    }

    pub fn succeed(&mut self, completed_at: DateTime<Utc>) {
        self.status = BatchStatus::Succeeded;
        self.completed_at = Some(completed_at);
        self.error_message = None;
    }

    pub fn fail(&mut self, completed_at: DateTime<Utc>, error_message: impl Into<String>) {
        self.status = BatchStatus::Failed;
        self.completed_at = Some(completed_at);
        self.error_message = Some(error_message.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status != BatchStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_at_set_iff_not_running() {
        let now = Utc::now();
        let mut batch = SyncBatch::start(vec!["p1".into()], now);
        assert!(batch.completed_at.is_none());
        assert!(!batch.is_terminal());

        batch.succeed(now);
        assert!(batch.completed_at.is_some());
        assert!(batch.is_terminal());
    }
}
