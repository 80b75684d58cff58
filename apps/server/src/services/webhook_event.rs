use sqlx::{PgExecutor, PgPool};

use crate::error::AppResult;
use crate::models::{Platform, WebhookEvent};

pub struct WebhookEventService;

impl WebhookEventService {
    /// Appends a verified delivery to the audit log
    pub async fn record(
        pool: &PgPool,
        platform: Platform,
        event_type: &str,
        payload: &str,
    ) -> AppResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO webhook_events (platform, event_type, payload)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(platform)
        .bind(event_type)
        .bind(payload)
        .fetch_one(pool)
        .await?;

        Ok(id)
    }

    pub async fn list_recent(
        pool: &PgPool,
        platform: Platform,
        limit: i64,
    ) -> AppResult<Vec<WebhookEvent>> {
        let events = sqlx::query_as::<_, WebhookEvent>(
            "SELECT * FROM webhook_events WHERE platform = $1 ORDER BY received_at DESC, id DESC LIMIT $2",
        )
        .bind(platform)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }

    pub async fn count(pool: &PgPool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Claims an idempotency key; false when the event was already applied
    pub async fn mark_processed<'e>(
        executor: impl PgExecutor<'e>,
        platform: Platform,
        event_key: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (platform, event_key)
            VALUES ($1, $2)
            ON CONFLICT (platform, event_key) DO NOTHING
            "#,
        )
        .bind(platform)
        .bind(event_key)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
