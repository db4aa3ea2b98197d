//! Pure scoring functions. No I/O, no shared state: every function is a
//! deterministic map from a record (and a reference instant, for recency) to
//! a score. The orchestrator decides *when* to call these; this crate only
//! decides *what number* comes out.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use syncwave_model::content::{ArticleMetrics, VideoMetrics};
use syncwave_model::{ContentMetrics, ContentRecord};

const RECENCY_RECENT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const RECENCY_MID: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
const RECENCY_OLD: Decimal = Decimal::from_parts(1, 0, 0, false, 0);
const RECENCY_STALE: Decimal = Decimal::from_parts(0, 0, 0, false, 0);

const DAY_SECONDS: i64 = 86_400;

/// Step-function contribution to the total score from age since
/// `published_at`. Shared by every variant.
///
/// - age ≤ 7d ⇒ 5
/// - 7d < age ≤ 30d ⇒ 3
/// - 30d < age ≤ 90d ⇒ 1
/// - age > 90d ⇒ 0
pub fn recency(published_at: DateTime<Utc>, now: DateTime<Utc>) -> Decimal {
    let elapsed_seconds = now.signed_duration_since(published_at).num_seconds();
    let age_days = Decimal::from(elapsed_seconds) / Decimal::from(DAY_SECONDS);

    if age_days <= Decimal::from(7) {
        RECENCY_RECENT
    } else if age_days <= Decimal::from(30) {
        RECENCY_MID
    } else if age_days <= Decimal::from(90) {
        RECENCY_OLD
    } else {
        RECENCY_STALE
    }
}

/// `(views/1000 + likes/100) * 1.5 + recency + (likes/max(views,1)) * 10`
pub fn score_video(metrics: &VideoMetrics, published_at: DateTime<Utc>, now: DateTime<Utc>) -> Decimal {
    let views = Decimal::from(metrics.views);
    let likes = Decimal::from(metrics.likes);
    let views_denom = if metrics.views == 0 { Decimal::ONE } else { views };

    let reach = (views / Decimal::from(1000) + likes / Decimal::from(100)) * Decimal::new(15, 1);
    let engagement = (likes / views_denom) * Decimal::from(10);

    (reach + recency(published_at, now) + engagement).round_dp(2)
}

/// `(reading_time + reactions/50) * 1.0 + recency + (reactions/max(reading_time,1)) * 5`
pub fn score_article(
    metrics: &ArticleMetrics,
    published_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Decimal {
    let reading_time = Decimal::from(metrics.reading_time_minutes);
    let reactions = Decimal::from(metrics.reactions);
    let reading_time_denom = if metrics.reading_time_minutes == 0 {
        Decimal::ONE
    } else {
        reading_time
    };

    let depth = reading_time + reactions / Decimal::from(50);
    let engagement = (reactions / reading_time_denom) * Decimal::from(5);

    (depth + recency(published_at, now) + engagement).round_dp(2)
}

/// Dispatches on the record's tag to the matching per-variant formula.
/// Callers (the orchestrator, the freshness job) must invoke this only for
/// records whose change type is `created` or `updated` — scoring an
/// `unchanged` record would violate the invariant the orchestrator relies on
/// for its `Scorer invoked exactly N times` counters.
pub fn score(record: &ContentRecord, now: DateTime<Utc>) -> Decimal {
    match record.metrics() {
        ContentMetrics::Video(m) => score_video(&m, record.published_at(), now),
        ContentMetrics::Article(m) => score_article(&m, record.published_at(), now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn video_score_matches_worked_example() {
        let metrics = VideoMetrics {
            views: 2000,
            likes: 100,
            duration: std::time::Duration::from_secs(600),
        };
        let published = at(2025, 1, 1);
        let now = at(2025, 1, 5);
        // (2000/1000 + 100/100) * 1.5 + 5 + (100/2000)*10 = 4.5 + 5 + 0.5 = 10.00
        assert_eq!(score_video(&metrics, published, now), Decimal::new(1000, 2));
    }

    #[test]
    fn article_score_matches_worked_example() {
        let metrics = ArticleMetrics {
            reading_time_minutes: 5,
            reactions: 50,
            comments: 3,
        };
        let published = at(2025, 1, 1);
        let now = at(2025, 1, 5);
        // (5 + 50/50) * 1.0 + 5 + (50/5)*5 = 6 + 5 + 50 = 61.00
        assert_eq!(score_article(&metrics, published, now), Decimal::new(6100, 2));
    }

    #[test]
    fn recency_boundary_is_inclusive_at_exactly_seven_days() {
        let published = at(2025, 1, 1);
        assert_eq!(recency(published, published + chrono::Duration::days(7)), RECENCY_RECENT);
        assert_eq!(
            recency(published, published + chrono::Duration::days(7) + chrono::Duration::seconds(1)),
            RECENCY_MID
        );
    }

    #[test]
    fn recency_boundary_at_thirty_and_ninety_days() {
        let published = at(2025, 1, 1);
        assert_eq!(recency(published, published + chrono::Duration::days(30)), RECENCY_MID);
        assert_eq!(recency(published, published + chrono::Duration::days(31)), RECENCY_OLD);
        assert_eq!(recency(published, published + chrono::Duration::days(90)), RECENCY_OLD);
        assert_eq!(recency(published, published + chrono::Duration::days(91)), RECENCY_STALE);
    }

    #[test]
    fn zero_denominators_are_clamped_not_divided_by_zero() {
        let metrics = VideoMetrics {
            views: 0,
            likes: 5,
            duration: std::time::Duration::from_secs(60),
        };
        let published = at(2025, 1, 1);
        let now = at(2025, 1, 1);
        // (0 + 0.05)*1.5 + 5 + (5/1)*10 = 0.075 + 5 + 50 = 55.08 (rounded)
        let score = score_video(&metrics, published, now);
        assert_eq!(score, Decimal::new(5508, 2));
    }

    #[test]
    fn high_engagement_ratios_are_not_capped() {
        let metrics = ArticleMetrics {
            reading_time_minutes: 1,
            reactions: 1000,
            comments: 0,
        };
        let published = at(2025, 1, 1);
        let now = at(2025, 1, 1);
        // (1 + 20)*1.0 + 5 + (1000/1)*5 = 21 + 5 + 5000 = 5026.00
        assert_eq!(score_article(&metrics, published, now), Decimal::new(502600, 2));
    }
}
