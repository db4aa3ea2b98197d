use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventChangeType {
    Created,
    Updated,
    Mixed,
    ScoreUpdated,
}

/// Decides the change type for a cycle's batched event from its created and
/// updated counts. `None` means nothing changed and no event should be
/// published.
pub fn classify(created_empty: bool, updated_empty: bool) -> Option<EventChangeType> {
    match (created_empty, updated_empty) {
        (true, true) => None,
        (true, false) => Some(EventChangeType::Updated),
        (false, true) => Some(EventChangeType::Created),
        (false, false) => Some(EventChangeType::Mixed),
    }
}

/// The single batched change event the orchestrator and freshness job
/// publish. `content_ids` are always deduplicated at construction time;
/// consumers never see duplicates within one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchChangeEvent {
    pub batch_id: Uuid,
    pub content_ids: Vec<String>,
    pub change_type: EventChangeType,
    pub source_provider: Option<String>,
    pub processed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, serde_json::Value>>,
}

impl BatchChangeEvent {
    pub fn new(
        batch_id: Uuid,
        content_ids: impl IntoIterator<Item = String>,
        change_type: EventChangeType,
        source_provider: Option<String>,
        processed_at: DateTime<Utc>,
    ) -> Self {
        let mut seen = HashSet::new();
        let content_ids = content_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self {
            batch_id,
            content_ids,
            change_type,
            source_provider,
            processed_at,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_set_membership() {
        assert_eq!(classify(true, true), None);
        assert_eq!(classify(true, false), Some(EventChangeType::Updated));
        assert_eq!(classify(false, true), Some(EventChangeType::Created));
        assert_eq!(classify(false, false), Some(EventChangeType::Mixed));
    }

    #[test]
    fn content_ids_are_deduplicated_preserving_first_occurrence() {
        let event = BatchChangeEvent::new(
            Uuid::new_v4(),
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
            EventChangeType::Created,
            Some("p1".into()),
            Utc::now(),
        );
        assert_eq!(event.content_ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let event = BatchChangeEvent::new(
            Uuid::new_v4(),
            vec!["a".to_string()],
            EventChangeType::ScoreUpdated,
            None,
            Utc::now(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["changeType"], "ScoreUpdated");
        assert!(json.get("contentIds").is_some());
        assert!(json.get("metadata").is_none());
    }
}
