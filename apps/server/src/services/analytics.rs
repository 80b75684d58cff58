use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{AnalyticsSnapshot, Platform, PostAnalytics};

pub struct AnalyticsService;

impl AnalyticsService {
    /// Upserts the realtime row; every column only moves upward
    pub async fn upsert_realtime(
        pool: &PgPool,
        post_id: i64,
        account_id: i64,
        platform: Platform,
        snapshot: &AnalyticsSnapshot,
    ) -> AppResult<PostAnalytics> {
        let row = sqlx::query_as::<_, PostAnalytics>(
            r#"
            INSERT INTO post_analytics (post_id, account_id, platform, impressions, reach,
                                        video_views, likes, comments, shares)
            VALUES ($1, $2, $3, COALESCE($4, 0), COALESCE($5, 0), COALESCE($6, 0),
                    COALESCE($7, 0), COALESCE($8, 0), COALESCE($9, 0))
            ON CONFLICT (post_id, account_id) DO UPDATE SET
                impressions = GREATEST(post_analytics.impressions, EXCLUDED.impressions),
                reach = GREATEST(post_analytics.reach, EXCLUDED.reach),
                video_views = GREATEST(post_analytics.video_views, EXCLUDED.video_views),
                likes = GREATEST(post_analytics.likes, EXCLUDED.likes),
                comments = GREATEST(post_analytics.comments, EXCLUDED.comments),
                shares = GREATEST(post_analytics.shares, EXCLUDED.shares),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(post_id)
        .bind(account_id)
        .bind(platform)
        .bind(snapshot.impressions)
        .bind(snapshot.reach)
        .bind(snapshot.video_views)
        .bind(snapshot.likes)
        .bind(snapshot.comments)
        .bind(snapshot.shares)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    pub async fn get(
        pool: &PgPool,
        post_id: i64,
        account_id: i64,
    ) -> AppResult<Option<PostAnalytics>> {
        let row = sqlx::query_as::<_, PostAnalytics>(
            "SELECT * FROM post_analytics WHERE post_id = $1 AND account_id = $2",
        )
        .bind(post_id)
        .bind(account_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }
}
