use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use syncwave_model::content::{ArticleContent, ArticleMetrics, VideoContent, VideoMetrics};
use syncwave_model::{CanonicalContent, ContentRecord};

use crate::error::{Result, StoreError};

/// Maps one row of `contents` back into a [`ContentRecord`]. Kept as a free
/// function rather than `FromRow` so the metrics/categories JSONB columns
/// can be deserialized against the right variant — `sqlx::query` (not
/// `query!`) is used everywhere in this crate so this is the only place
/// that needs to know the column layout.
pub fn content_record_from_row(row: &sqlx::postgres::PgRow) -> Result<ContentRecord> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("type")?;
    let title: String = row.try_get("title")?;
    let published_at: DateTime<Utc> = row.try_get("published_at")?;
    let categories: serde_json::Value = row.try_get("categories")?;
    let categories: Vec<String> = serde_json::from_value(categories)?;
    let source_provider: String = row.try_get("source_provider")?;
    let metrics: serde_json::Value = row.try_get("metrics")?;
    let score: Decimal = row.try_get("score")?;
    let content_hash: String = row.try_get("content_hash")?;
    let version: i64 = row.try_get("version")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let content = match kind.as_str() {
        "video" => CanonicalContent::Video(VideoContent {
            id,
            title,
            published_at,
            categories,
            source_provider,
            metrics: serde_json::from_value::<VideoMetrics>(metrics)?,
        }),
        "article" => CanonicalContent::Article(ArticleContent {
            id,
            title,
            published_at,
            categories,
            source_provider,
            metrics: serde_json::from_value::<ArticleMetrics>(metrics)?,
        }),
        other => return Err(StoreError::UnknownContentType(other.to_string())),
    };

    Ok(ContentRecord {
        content,
        score,
        content_hash,
        version,
        created_at,
        updated_at,
    })
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from_sqlx("<unknown>", err)
    }
}

/// Columns used to drive one row's upsert, split out of `ContentRecord` so
/// the binary representation (type tag, metrics JSON) lives in one place.
pub struct ContentRow<'a> {
    pub id: &'a str,
    pub kind: &'static str,
    pub title: &'a str,
    pub published_at: DateTime<Utc>,
    pub categories: serde_json::Value,
    pub source_provider: &'a str,
    pub metrics: serde_json::Value,
    pub score: Decimal,
    pub content_hash: &'a str,
}

pub fn content_row(record: &ContentRecord) -> Result<ContentRow<'_>> {
    let (kind, metrics) = match record.metrics() {
        syncwave_model::ContentMetrics::Video(m) => ("video", serde_json::to_value(m)?),
        syncwave_model::ContentMetrics::Article(m) => ("article", serde_json::to_value(m)?),
    };
    Ok(ContentRow {
        id: record.id(),
        kind,
        title: record.title(),
        published_at: record.published_at(),
        categories: serde_json::to_value(record.categories())?,
        source_provider: record.source_provider(),
        metrics,
        score: record.score,
        content_hash: &record.content_hash,
    })
}
