use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{Account, NewAccount, Platform, TokenSet};
use crate::platforms::OAuthGrant;

pub struct AccountService;

impl AccountService {
    /// Stores a connected account; a second active identity is a conflict
    pub async fn create(pool: &PgPool, input: NewAccount) -> AppResult<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (tenant_id, platform, platform_user_id, display_name,
                                  access_token, refresh_token, token_expires_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.platform)
        .bind(&input.platform_user_id)
        .bind(&input.display_name)
        .bind(&input.access_token)
        .bind(&input.refresh_token)
        .bind(input.token_expires_at)
        .bind(&input.metadata)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("accounts_active_identity_idx") {
                    return AppError::Conflict(format!(
                        "{} account {} is already connected",
                        input.platform, input.platform_user_id
                    ));
                }
            }
            AppError::Database(e)
        })
    }

    /// Creates the account or refreshes the credentials of the active one
    pub async fn upsert_from_grant(
        pool: &PgPool,
        tenant_id: i64,
        platform: Platform,
        grant: &OAuthGrant,
    ) -> AppResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (tenant_id, platform, platform_user_id, display_name,
                                  access_token, refresh_token, token_expires_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (tenant_id, platform, platform_user_id) WHERE is_active
            DO UPDATE SET
                display_name = EXCLUDED.display_name,
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, accounts.refresh_token),
                token_expires_at = EXCLUDED.token_expires_at,
                metadata = accounts.metadata || EXCLUDED.metadata,
                last_refresh_error = NULL,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(platform)
        .bind(&grant.platform_user_id)
        .bind(&grant.platform_username)
        .bind(&grant.tokens.access_token)
        .bind(&grant.tokens.refresh_token)
        .bind(grant.tokens.expires_at)
        .bind(&grant.metadata)
        .fetch_one(pool)
        .await?;

        Ok(account)
    }

    pub async fn get(pool: &PgPool, id: i64) -> AppResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))
    }

    /// Active account that owns a platform-side user id (page, IG user, member)
    pub async fn find_active_by_platform_user(
        pool: &PgPool,
        platform: Platform,
        platform_user_id: &str,
    ) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE platform = $1 AND platform_user_id = $2 AND is_active
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(platform)
        .bind(platform_user_id)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }

    pub async fn list_for_tenant(pool: &PgPool, tenant_id: i64) -> AppResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE tenant_id = $1 AND is_active ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;

        Ok(accounts)
    }

    /// Persists refreshed credentials; a missing refresh token keeps the stored one
    pub async fn update_tokens(pool: &PgPool, id: i64, tokens: &TokenSet) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts SET
                access_token = $2,
                refresh_token = COALESCE($3, refresh_token),
                token_expires_at = $4,
                last_refreshed_at = NOW(),
                last_refresh_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn record_refresh_failure(pool: &PgPool, id: i64, error: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE accounts SET last_refresh_error = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Soft delete; posts keep referencing the row
    pub async fn deactivate(pool: &PgPool, id: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Active account {} not found", id)));
        }
        Ok(())
    }

    /// Active accounts with a refresh token expiring before `before`, soonest first.
    /// Already-expired tokens are included.
    pub async fn list_expiring(pool: &PgPool, before: DateTime<Utc>) -> AppResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE is_active
              AND refresh_token IS NOT NULL
              AND refresh_token <> ''
              AND token_expires_at IS NOT NULL
              AND token_expires_at <= $1
            ORDER BY token_expires_at ASC
            "#,
        )
        .bind(before)
        .fetch_all(pool)
        .await?;

        Ok(accounts)
    }

    /// Claims the account for a refresh; false when another sweep holds it
    pub async fn try_lock_for_refresh(
        pool: &PgPool,
        id: i64,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET refresh_locked_until = $3
            WHERE id = $1 AND (refresh_locked_until IS NULL OR refresh_locked_until <= $2)
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(now + ttl)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn release_refresh_lock(pool: &PgPool, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET refresh_locked_until = NULL WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
