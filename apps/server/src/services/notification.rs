use sqlx::{PgExecutor, PgPool};

use crate::error::AppResult;
use crate::models::{NewNotification, Notification};

pub struct NotificationService;

impl NotificationService {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        input: &NewNotification,
    ) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (tenant_id, notification_type, platform, title, message, data)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.notification_type)
        .bind(input.platform)
        .bind(&input.title)
        .bind(&input.message)
        .bind(&input.data)
        .fetch_one(executor)
        .await?;

        Ok(notification)
    }

    /// Most recent notifications first
    pub async fn list_for_tenant(
        pool: &PgPool,
        tenant_id: i64,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    pub async fn count_for_tenant(pool: &PgPool, tenant_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
