use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Discriminator for [`CanonicalContent`]. Mirrors the `"type"` field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Video,
    Article,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Video => write!(f, "video"),
            ContentType::Article => write!(f, "article"),
        }
    }
}

/// Normalized content as handed to the core by a provider adapter. Immutable
/// once constructed; never mutated in place.
///
/// The `type` discriminator on the wire selects which struct fills the rest
/// of the object, so `metrics` always matches the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalContent {
    Video(VideoContent),
    Article(ArticleContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoContent {
    pub id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub source_provider: String,
    pub metrics: VideoMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArticleContent {
    pub id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub categories: Vec<String>,
    pub source_provider: String,
    pub metrics: ArticleMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetrics {
    pub views: u64,
    pub likes: u64,
    #[serde(with = "iso8601_duration")]
    #[schemars(with = "String")]
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArticleMetrics {
    pub reading_time_minutes: u32,
    pub reactions: u64,
    pub comments: u64,
}

/// Per-variant metrics, exposed as an enum for callers that don't want to
/// match on `CanonicalContent` itself (the scorer and the change detector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMetrics {
    Video(VideoMetrics),
    Article(ArticleMetrics),
}

impl CanonicalContent {
    pub fn tag(&self) -> ContentType {
        match self {
            CanonicalContent::Video(_) => ContentType::Video,
            CanonicalContent::Article(_) => ContentType::Article,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CanonicalContent::Video(v) => &v.id,
            CanonicalContent::Article(a) => &a.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CanonicalContent::Video(v) => &v.title,
            CanonicalContent::Article(a) => &a.title,
        }
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        match self {
            CanonicalContent::Video(v) => v.published_at,
            CanonicalContent::Article(a) => a.published_at,
        }
    }

    pub fn categories(&self) -> &[String] {
        match self {
            CanonicalContent::Video(v) => &v.categories,
            CanonicalContent::Article(a) => &a.categories,
        }
    }

    pub fn source_provider(&self) -> &str {
        match self {
            CanonicalContent::Video(v) => &v.source_provider,
            CanonicalContent::Article(a) => &a.source_provider,
        }
    }

    pub fn metrics(&self) -> ContentMetrics {
        match self {
            CanonicalContent::Video(v) => ContentMetrics::Video(v.metrics),
            CanonicalContent::Article(a) => ContentMetrics::Article(a.metrics),
        }
    }
}

/// Serializes/deserializes [`Duration`] as an ISO-8601 duration string
/// (`PT22M45S`), the wire format the spec mandates for video length.
///
/// Only hours/minutes/seconds are produced; sub-second precision is dropped
/// since provider durations are whole seconds in practice.
pub mod iso8601_duration {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(D::Error::custom)
    }

    pub fn format_duration(duration: &Duration) -> String {
        let mut total = duration.as_secs();
        let hours = total / 3600;
        total %= 3600;
        let minutes = total / 60;
        let seconds = total % 60;

        let mut out = String::from("PT");
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 || (hours == 0 && minutes == 0) {
            out.push_str(&format!("{seconds}S"));
        }
        out
    }

    pub fn parse_duration(raw: &str) -> Result<Duration, String> {
        let rest = raw
            .strip_prefix("PT")
            .ok_or_else(|| format!("not an ISO-8601 duration: {raw}"))?;

        let mut seconds: u64 = 0;
        let mut num = String::new();
        for ch in rest.chars() {
            match ch {
                '0'..='9' => num.push(ch),
                'H' => {
                    seconds += parse_component(&num, raw)? * 3600;
                    num.clear();
                }
                'M' => {
                    seconds += parse_component(&num, raw)? * 60;
                    num.clear();
                }
                'S' => {
                    seconds += parse_component(&num, raw)?;
                    num.clear();
                }
                other => return Err(format!("unexpected character '{other}' in duration {raw}")),
            }
        }
        if !num.is_empty() {
            return Err(format!("trailing digits with no unit in duration {raw}"));
        }
        Ok(Duration::from_secs(seconds))
    }

    fn parse_component(num: &str, raw: &str) -> Result<u64, String> {
        num.parse()
            .map_err(|_| format!("invalid number in duration {raw}"))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn formats_hours_minutes_seconds() {
            assert_eq!(format_duration(&Duration::from_secs(22 * 60 + 45)), "PT22M45S");
            assert_eq!(format_duration(&Duration::from_secs(3661)), "PT1H1M1S");
            assert_eq!(format_duration(&Duration::from_secs(0)), "PT0S");
        }

        #[test]
        fn round_trips() {
            for secs in [0, 5, 60, 599, 3600, 3661, 7325] {
                let d = Duration::from_secs(secs);
                let parsed = parse_duration(&format_duration(&d)).unwrap();
                assert_eq!(parsed, d);
            }
        }

        #[test]
        fn rejects_malformed_input() {
            assert!(parse_duration("10M").is_err());
            assert!(parse_duration("PTX").is_err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video() -> CanonicalContent {
        CanonicalContent::Video(VideoContent {
            id: "p1_a".into(),
            title: "A".into(),
            published_at: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            categories: vec!["x".into()],
            source_provider: "p1".into(),
            metrics: VideoMetrics {
                views: 2000,
                likes: 100,
                duration: Duration::from_secs(600),
            },
        })
    }

    #[test]
    fn wire_shape_uses_type_discriminator() {
        let json = serde_json::to_value(sample_video()).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["metrics"]["duration"], "PT10M");
    }

    #[test]
    fn accessors_match_variant_fields() {
        let c = sample_video();
        assert_eq!(c.tag(), ContentType::Video);
        assert_eq!(c.id(), "p1_a");
        assert_eq!(c.categories(), &["x".to_string()]);
    }
}
