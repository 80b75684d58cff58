use std::collections::HashMap;

use sqlx::{PgExecutor, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{NewPost, Platform, Post, PostPlatformId, PostStatus, PostTarget};

pub struct PostService;

impl PostService {
    pub async fn create(pool: &PgPool, input: NewPost) -> AppResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (tenant_id, content) VALUES ($1, $2) RETURNING *",
        )
        .bind(input.tenant_id)
        .bind(&input.content)
        .fetch_one(pool)
        .await?;

        Ok(post)
    }

    pub async fn get(pool: &PgPool, id: i64) -> AppResult<Post> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
    }

    pub async fn update_status(pool: &PgPool, id: i64, status: PostStatus) -> AppResult<()> {
        sqlx::query("UPDATE posts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Stores the external id a platform assigned after publishing
    pub async fn record_platform_post_id(
        pool: &PgPool,
        post_id: i64,
        platform: Platform,
        account_id: i64,
        platform_post_id: &str,
    ) -> AppResult<PostPlatformId> {
        let row = sqlx::query_as::<_, PostPlatformId>(
            r#"
            INSERT INTO post_platform_ids (post_id, platform, account_id, platform_post_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (post_id, platform) DO UPDATE SET
                account_id = EXCLUDED.account_id,
                platform_post_id = EXCLUDED.platform_post_id,
                published_at = NOW()
            RETURNING *
            "#,
        )
        .bind(post_id)
        .bind(platform)
        .bind(account_id)
        .bind(platform_post_id)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    /// Platform to external id map of a post
    pub async fn platform_post_ids(
        pool: &PgPool,
        post_id: i64,
    ) -> AppResult<HashMap<Platform, String>> {
        let rows: Vec<(Platform, String)> = sqlx::query_as(
            "SELECT platform, platform_post_id FROM post_platform_ids WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Resolves a platform-side object id to the post it was published as
    pub async fn find_by_platform_post_id<'e>(
        executor: impl PgExecutor<'e>,
        platform: Platform,
        platform_post_id: &str,
    ) -> AppResult<Option<PostTarget>> {
        let target = sqlx::query_as::<_, PostTarget>(
            r#"
            SELECT p.id AS post_id, p.tenant_id, ppi.account_id, ppi.platform
            FROM post_platform_ids ppi
            JOIN posts p ON p.id = ppi.post_id
            WHERE ppi.platform = $1 AND ppi.platform_post_id = $2
            "#,
        )
        .bind(platform)
        .bind(platform_post_id)
        .fetch_optional(executor)
        .await?;

        Ok(target)
    }
}
