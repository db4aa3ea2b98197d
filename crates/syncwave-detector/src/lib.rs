//! Hash-based change detection: the single concrete implementation of the
//! detection capability. Expressed behind a trait so a future detector
//! (timestamp-based, say) can substitute without the orchestrator changing.

use std::collections::HashMap;

use syncwave_model::{ChangeResult, ChangeType, ContentRecord, FieldDelta};

/// Capability interface for "does this incoming record represent a change".
/// The orchestrator depends on this, not on `HashChangeDetector` directly.
pub trait ChangeDetector {
    fn detect(&self, incoming: Vec<ContentRecord>, existing: Vec<ContentRecord>) -> Vec<ChangeResult>;
}

/// Diffs an incoming batch against a stored batch keyed by id. Hash equality
/// is the sole source of truth for the created/updated/unchanged
/// classification; other stored-field drift with an equal hash is still
/// reported as unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashChangeDetector;

impl ChangeDetector for HashChangeDetector {
    fn detect(&self, incoming: Vec<ContentRecord>, existing: Vec<ContentRecord>) -> Vec<ChangeResult> {
        detect(incoming, existing)
    }
}

/// Free function form, used directly by tests and anywhere a trait object
/// isn't warranted.
pub fn detect(incoming: Vec<ContentRecord>, existing: Vec<ContentRecord>) -> Vec<ChangeResult> {
    let existing_by_id: HashMap<String, ContentRecord> = existing
        .into_iter()
        .map(|record| (record.id().to_string(), record))
        .collect();

    let deduped = dedup_last_wins(incoming);

    deduped
        .into_iter()
        .map(|incoming_record| classify(incoming_record, &existing_by_id))
        .collect()
}

fn dedup_last_wins(incoming: Vec<ContentRecord>) -> Vec<ContentRecord> {
    let mut by_id: HashMap<String, ContentRecord> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for record in incoming {
        let id = record.id().to_string();
        if by_id.contains_key(&id) {
            tracing::warn!(content_id = %id, "duplicate id within incoming batch, last occurrence wins");
        } else {
            order.push(id.clone());
        }
        by_id.insert(id, record);
    }

    order
        .into_iter()
        .map(|id| by_id.remove(&id).expect("id was just inserted"))
        .collect()
}

fn classify(incoming: ContentRecord, existing_by_id: &HashMap<String, ContentRecord>) -> ChangeResult {
    let previous = existing_by_id.get(incoming.id()).cloned();

    match &previous {
        None => ChangeResult {
            incoming,
            previous,
            change_type: ChangeType::Created,
            changed_fields: Vec::new(),
        },
        Some(existing) if existing.content_hash == incoming.content_hash => ChangeResult {
            incoming,
            previous,
            change_type: ChangeType::Unchanged,
            changed_fields: Vec::new(),
        },
        Some(existing) => {
            let changed_fields = diff_fields(existing, &incoming);
            ChangeResult {
                incoming,
                previous,
                change_type: ChangeType::Updated,
                changed_fields,
            }
        }
    }
}

/// Diffs the semantic fields the spec names: title, published_at,
/// categories, metrics, source_provider. `score` is deliberately excluded
/// here — it is still a placeholder at detection time; the orchestrator
/// appends its own `FieldDelta` for score once the Scorer has run.
fn diff_fields(existing: &ContentRecord, incoming: &ContentRecord) -> Vec<FieldDelta> {
    let mut deltas = Vec::new();

    if existing.title() != incoming.title() {
        deltas.push(FieldDelta::new(
            "title",
            serde_json::json!(existing.title()),
            serde_json::json!(incoming.title()),
        ));
    }

    if existing.published_at() != incoming.published_at() {
        deltas.push(FieldDelta::new(
            "published_at",
            serde_json::json!(existing.published_at().to_rfc3339()),
            serde_json::json!(incoming.published_at().to_rfc3339()),
        ));
    }

    if existing.categories() != incoming.categories() {
        deltas.push(FieldDelta::new(
            "categories",
            serde_json::json!(existing.categories()),
            serde_json::json!(incoming.categories()),
        ));
    }

    if existing.source_provider() != incoming.source_provider() {
        deltas.push(FieldDelta::new(
            "source_provider",
            serde_json::json!(existing.source_provider()),
            serde_json::json!(incoming.source_provider()),
        ));
    }

    let existing_metrics = serde_json::to_value(existing.content.clone())
        .ok()
        .and_then(|v| v.get("metrics").cloned());
    let incoming_metrics = serde_json::to_value(incoming.content.clone())
        .ok()
        .and_then(|v| v.get("metrics").cloned());
    if existing_metrics != incoming_metrics {
        deltas.push(FieldDelta::new(
            "metrics",
            existing_metrics.unwrap_or(serde_json::Value::Null),
            incoming_metrics.unwrap_or(serde_json::Value::Null),
        ));
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use syncwave_model::content::{VideoContent, VideoMetrics};
    use syncwave_model::CanonicalContent;

    fn video(id: &str, views: u64, now: DateTime<Utc>) -> ContentRecord {
        let content = CanonicalContent::Video(VideoContent {
            id: id.to_string(),
            title: "A".into(),
            published_at: now,
            categories: vec!["x".into()],
            source_provider: "p1".into(),
            metrics: VideoMetrics {
                views,
                likes: 100,
                duration: std::time::Duration::from_secs(600),
            },
        });
        ContentRecord::new_unscored(content, now)
    }

    #[test]
    fn absent_existing_is_created() {
        let now = Utc::now();
        let results = detect(vec![video("p1_a", 2000, now)], vec![]);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_created());
    }

    #[test]
    fn matching_hash_is_unchanged_even_with_score_drift() {
        let now = Utc::now();
        let mut existing = video("p1_a", 2000, now);
        existing.score = rust_decimal::Decimal::new(999, 2);
        let incoming = video("p1_a", 2000, now);
        let results = detect(vec![incoming], vec![existing]);
        assert!(results[0].is_unchanged());
    }

    #[test]
    fn differing_hash_is_updated_with_metrics_delta() {
        let now = Utc::now();
        let existing = video("p1_a", 2000, now);
        let incoming = video("p1_a", 3000, now);
        let results = detect(vec![incoming], vec![existing]);
        assert!(results[0].is_updated());
        assert!(results[0].changed_fields.iter().any(|d| d.field == "metrics"));
    }

    #[test]
    fn duplicate_incoming_ids_keep_last_occurrence() {
        let now = Utc::now();
        let first = video("p1_a", 1000, now);
        let second = video("p1_a", 2000, now);
        let results = detect(vec![first, second], vec![]);
        assert_eq!(results.len(), 1);
        match &results[0].incoming.metrics() {
            syncwave_model::ContentMetrics::Video(m) => assert_eq!(m.views, 2000),
            _ => panic!("expected video metrics"),
        }
    }
}
