use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::content::{iso8601_duration, CanonicalContent, ContentMetrics};

/// Computes the 256-bit content fingerprint the Store uses for change
/// detection. Deterministic across hosts, architectures, and restarts: the
/// canonical field order (tag, id, title, published_at, categories,
/// source_provider, then variant metrics) and encoding (length-prefixed
/// UTF-8, fixed-width big-endian integers, RFC3339 UTC instants, ISO-8601
/// durations) are both fixed, so no implementation-defined whitespace or
/// number formatting can leak in.
///
/// Never fails: inputs are assumed validated by the adapter.
pub fn fingerprint(content: &CanonicalContent) -> [u8; 32] {
    let mut buf = Vec::new();

    push_str(&mut buf, &content.tag().to_string());
    push_str(&mut buf, content.id());
    push_str(&mut buf, content.title());
    push_str(
        &mut buf,
        &content
            .published_at()
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    push_u64(&mut buf, content.categories().len() as u64);
    for category in content.categories() {
        push_str(&mut buf, category);
    }

    push_str(&mut buf, content.source_provider());

    match content.metrics() {
        ContentMetrics::Video(m) => {
            push_u64(&mut buf, m.views);
            push_u64(&mut buf, m.likes);
            push_str(&mut buf, &iso8601_duration::format_duration(&m.duration));
        }
        ContentMetrics::Article(m) => {
            push_u64(&mut buf, m.reading_time_minutes as u64);
            push_u64(&mut buf, m.reactions);
            push_u64(&mut buf, m.comments);
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(&buf);
    hasher.finalize().into()
}

fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u64).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn push_u64(buf: &mut Vec<u8>, n: u64) {
    buf.extend_from_slice(&n.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{VideoContent, VideoMetrics};
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    fn video(categories: Vec<&str>, views: u64) -> CanonicalContent {
        CanonicalContent::Video(VideoContent {
            id: "p1_a".into(),
            title: "A".into(),
            published_at: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            categories: categories.into_iter().map(String::from).collect(),
            source_provider: "p1".into(),
            metrics: VideoMetrics {
                views,
                likes: 100,
                duration: Duration::from_secs(600),
            },
        })
    }

    #[test]
    fn identical_records_hash_identically() {
        assert_eq!(
            fingerprint(&video(vec!["x"], 2000)),
            fingerprint(&video(vec!["x"], 2000))
        );
    }

    #[test]
    fn changed_metric_changes_hash() {
        assert_ne!(
            fingerprint(&video(vec!["x"], 2000)),
            fingerprint(&video(vec!["x"], 3000))
        );
    }

    #[test]
    fn category_reordering_is_not_ignored() {
        assert_ne!(
            fingerprint(&video(vec!["x", "y"], 2000)),
            fingerprint(&video(vec!["y", "x"], 2000))
        );
    }

    #[test]
    fn fingerprint_is_stable_across_recomputation() {
        let a = video(vec!["x"], 2000);
        let first = fingerprint(&a);
        let reserialized: CanonicalContent =
            serde_json::from_value(serde_json::to_value(&a).unwrap()).unwrap();
        assert_eq!(first, fingerprint(&reserialized));
    }
}
