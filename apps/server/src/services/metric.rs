use sqlx::{PgExecutor, PgPool};

use crate::error::AppResult;
use crate::models::{MetricName, Platform, PostMetric};

pub struct MetricService;

impl MetricService {
    /// Adds `by` to a discrete counter in one statement; returns the new value
    pub async fn increment<'e>(
        executor: impl PgExecutor<'e>,
        post_id: i64,
        platform: Platform,
        metric: MetricName,
        by: i64,
    ) -> AppResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO post_metrics (post_id, platform, metric, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (post_id, platform, metric) DO UPDATE SET
                value = post_metrics.value + EXCLUDED.value,
                updated_at = NOW()
            RETURNING value
            "#,
        )
        .bind(post_id)
        .bind(platform)
        .bind(metric)
        .bind(by)
        .fetch_one(executor)
        .await?;

        Ok(value)
    }

    /// Applies a cumulative snapshot; the stored value never decreases
    pub async fn record_gauge<'e>(
        executor: impl PgExecutor<'e>,
        post_id: i64,
        platform: Platform,
        metric: MetricName,
        value: i64,
    ) -> AppResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO post_metrics (post_id, platform, metric, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (post_id, platform, metric) DO UPDATE SET
                value = GREATEST(post_metrics.value, EXCLUDED.value),
                updated_at = NOW()
            RETURNING value
            "#,
        )
        .bind(post_id)
        .bind(platform)
        .bind(metric)
        .bind(value)
        .fetch_one(executor)
        .await?;

        Ok(value)
    }

    /// Current value, zero when never recorded
    pub async fn get(
        pool: &PgPool,
        post_id: i64,
        platform: Platform,
        metric: MetricName,
    ) -> AppResult<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT value FROM post_metrics WHERE post_id = $1 AND platform = $2 AND metric = $3",
        )
        .bind(post_id)
        .bind(platform)
        .bind(metric)
        .fetch_optional(pool)
        .await?;

        Ok(value.unwrap_or(0))
    }

    pub async fn list_for_post(pool: &PgPool, post_id: i64) -> AppResult<Vec<PostMetric>> {
        let metrics = sqlx::query_as::<_, PostMetric>(
            "SELECT * FROM post_metrics WHERE post_id = $1 ORDER BY platform, metric",
        )
        .bind(post_id)
        .fetch_all(pool)
        .await?;

        Ok(metrics)
    }
}
