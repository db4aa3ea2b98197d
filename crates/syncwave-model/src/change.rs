use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::ContentRecord;

/// Classification a single incoming record receives once compared against
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Unchanged,
}

/// One field-level difference between the stored and incoming record.
/// `old`/`new` are kept as JSON values rather than typed so the same shape
/// covers title, categories, metrics, and score without a variant per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field: String,
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

impl FieldDelta {
    pub fn new(
        field: impl Into<String>,
        old: impl Into<serde_json::Value>,
        new: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Output of the Change Detector for one incoming record.
#[derive(Debug, Clone)]
pub struct ChangeResult {
    pub incoming: ContentRecord,
    pub previous: Option<ContentRecord>,
    pub change_type: ChangeType,
    /// Populated only when `change_type == Updated`.
    pub changed_fields: Vec<FieldDelta>,
}

impl ChangeResult {
    pub fn is_created(&self) -> bool {
        self.change_type == ChangeType::Created
    }

    pub fn is_updated(&self) -> bool {
        self.change_type == ChangeType::Updated
    }

    pub fn is_unchanged(&self) -> bool {
        self.change_type == ChangeType::Unchanged
    }

    pub fn needs_scoring(&self) -> bool {
        !self.is_unchanged()
    }
}

/// Append-only audit row written alongside every created/updated upsert.
/// Never produced for `unchanged` records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: Uuid,
    pub content_id: String,
    pub change_type: ChangeType,
    pub previous_hash: Option<String>,
    pub new_hash: String,
    pub previous_score: Option<Decimal>,
    pub new_score: Decimal,
    pub changed_fields: Vec<FieldDelta>,
    pub source_provider: String,
    pub detected_at: DateTime<Utc>,
    pub sync_batch_id: Uuid,
}

impl ChangeLogEntry {
    pub fn from_change_result(result: &ChangeResult, sync_batch_id: Uuid, detected_at: DateTime<Utc>) -> Self {
        debug_assert!(!result.is_unchanged(), "change log entries are never written for unchanged records");
        Self {
            id: Uuid::new_v4(),
            content_id: result.incoming.id().to_string(),
            change_type: result.change_type,
            previous_hash: result.previous.as_ref().map(|p| p.content_hash.clone()),
            new_hash: result.incoming.content_hash.clone(),
            previous_score: result.previous.as_ref().map(|p| p.score),
            new_score: result.incoming.score,
            changed_fields: result.changed_fields.clone(),
            source_provider: result.incoming.source_provider().to_string(),
            detected_at,
            sync_batch_id,
        }
    }
}
