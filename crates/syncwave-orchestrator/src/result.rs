use uuid::Uuid;

/// Counters the orchestrator returns for one `run_once` cycle. Mirrors the
/// fields persisted on the [`syncwave_model::SyncBatch`] row, plus the
/// per-row failure diagnostics the caller needs to act on without
/// re-querying the store.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub sync_batch_id: Option<Uuid>,
    pub items_fetched: i64,
    pub items_created: i64,
    pub items_updated: i64,
    pub items_unchanged: i64,
    pub rows_affected: i64,
    pub failed_ids: Vec<(String, String)>,
    pub providers_failed: Vec<String>,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

/// Counters for one `update_daily_scores` (or `recalculate_all`) run.
#[derive(Debug, Clone, Default)]
pub struct ScoreUpdateResult {
    pub candidates_examined: i64,
    pub updated: i64,
    pub rows_affected: i64,
    pub failed_ids: Vec<(String, String)>,
}
