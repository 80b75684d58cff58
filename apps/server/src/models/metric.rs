use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Platform;

/// Named per-post metric.
///
/// Discrete counters grow by addition; gauges are cumulative snapshots that
/// only ever move upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Likes,
    Comments,
    Shares,
    Replies,
    Retweets,
    Views,
    Impressions,
    Reach,
    VideoViews,
}

impl MetricName {
    pub fn is_gauge(&self) -> bool {
        matches!(
            self,
            MetricName::Views | MetricName::Impressions | MetricName::Reach | MetricName::VideoViews
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostMetric {
    pub post_id: i64,
    pub platform: Platform,
    pub metric: MetricName,
    pub value: i64,
    pub updated_at: DateTime<Utc>,
}

/// Realtime analytics row, one per post and account
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostAnalytics {
    pub post_id: i64,
    pub account_id: i64,
    pub platform: Platform,
    pub impressions: i64,
    pub reach: i64,
    pub video_views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot values extracted from an insights payload; absent values are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsSnapshot {
    pub impressions: Option<i64>,
    pub reach: Option<i64>,
    pub video_views: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
}

impl AnalyticsSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Gauge metrics mirrored into `post_metrics`
    pub fn gauges(&self) -> Vec<(MetricName, i64)> {
        [
            (MetricName::Impressions, self.impressions),
            (MetricName::Reach, self.reach),
            (MetricName::VideoViews, self.video_views),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}
