use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::content::{CanonicalContent, ContentMetrics, ContentType};
use crate::fingerprint::fingerprint;

/// The stored form of a [`CanonicalContent`]: everything the core persists
/// about one piece of content, including derived fields the Store owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content: CanonicalContent,
    /// Non-negative; zero until the first score computation.
    pub score: Decimal,
    /// Hex-encoded SHA-256 digest, recomputed every cycle from the canonical
    /// fields only — never from `score` or the audit fields below.
    pub content_hash: String,
    /// Starts at 1, incremented on every write by the store's trigger.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Builds a freshly-observed record with `score = 0` and a hash computed
    /// from `content`. Callers fill in `score` once the Scorer has run and
    /// let the Store assign `created_at`/`updated_at`/`version` on upsert.
    pub fn new_unscored(content: CanonicalContent, now: DateTime<Utc>) -> Self {
        let content_hash = hex::encode(fingerprint(&content));
        Self {
            content,
            score: Decimal::ZERO,
            content_hash,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        self.content.id()
    }

    pub fn tag(&self) -> ContentType {
        self.content.tag()
    }

    pub fn title(&self) -> &str {
        self.content.title()
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.content.published_at()
    }

    pub fn categories(&self) -> &[String] {
        self.content.categories()
    }

    pub fn source_provider(&self) -> &str {
        self.content.source_provider()
    }

    pub fn metrics(&self) -> ContentMetrics {
        self.content.metrics()
    }

    /// Recomputes `content_hash` from the current `content` and reports
    /// whether it differs from the stored value.
    pub fn recompute_hash(&self) -> String {
        hex::encode(fingerprint(&self.content))
    }
}
