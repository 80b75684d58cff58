use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use sqlx::PgPool;

use super::{AccountService, PostService};
use crate::error::{AppError, AppResult, PlatformError};
use crate::models::{Account, Platform, Post, PostStatus};
use crate::platforms::{MediaFile, PlatformContext, PostOptions};

/// How long a publish may hold an account's refresh lock
const REFRESH_LOCK_TTL_SECS: i64 = 300;

/// Polls while another worker is refreshing the same account
const REFRESH_WAIT_ATTEMPTS: u32 = 20;
const REFRESH_WAIT_INTERVAL: Duration = Duration::from_millis(250);

/// Publishes one stored post to several connected accounts
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub post_id: i64,
    pub account_ids: Vec<i64>,
    pub media: Vec<MediaFile>,
    pub options: PostOptions,
}

/// Outcome for one target account
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub account_id: i64,
    pub platform: Option<Platform>,
    pub success: bool,
    pub platform_post_id: Option<String>,
    pub message: String,
    /// The account has to be connected again before it can publish
    pub reauth_required: bool,
}

impl PublishResult {
    fn failed(account_id: i64, platform: Option<Platform>, error: &AppError) -> Self {
        let reauth_required = matches!(error, AppError::Platform(e) if e.is_reauth());
        Self {
            account_id,
            platform,
            success: false,
            platform_post_id: None,
            message: error.to_string(),
            reauth_required,
        }
    }
}

pub struct PublishService;

impl PublishService {
    /// Publishes to every account concurrently and updates the post status.
    ///
    /// A failure on one account never prevents the others; the post ends up
    /// `published`, `partial` or `failed` depending on how many succeeded.
    pub async fn publish(
        pool: &PgPool,
        ctx: &PlatformContext,
        request: &PublishRequest,
    ) -> AppResult<Vec<PublishResult>> {
        if request.account_ids.is_empty() {
            return Err(AppError::Validation(
                "At least one account is required".to_string(),
            ));
        }

        let post = PostService::get(pool, request.post_id).await?;

        let results = join_all(
            request
                .account_ids
                .iter()
                .map(|&account_id| Self::publish_to_account(pool, ctx, &post, account_id, request)),
        )
        .await;

        let succeeded = results.iter().filter(|r| r.success).count();
        let status = match succeeded {
            0 => PostStatus::Failed,
            n if n == results.len() => PostStatus::Published,
            _ => PostStatus::Partial,
        };
        PostService::update_status(pool, post.id, status).await?;

        log::info!(
            "Post {} published to {}/{} accounts",
            post.id,
            succeeded,
            results.len()
        );

        Ok(results)
    }

    /// Serialises token refreshes with the sweep and other publishes.
    ///
    /// An account whose token needs refreshing is locked before the adapter may
    /// refresh it. When another worker holds the lock, the account is reloaded
    /// until that worker has stored the new tokens. Returns the account to
    /// publish with and whether the caller must release the lock.
    async fn claim_token(pool: &PgPool, account: Account) -> AppResult<(Account, bool)> {
        let id = account.id;
        let mut account = account;

        for _ in 0..REFRESH_WAIT_ATTEMPTS {
            if !(account.is_token_expired() && account.has_refresh_token()) {
                return Ok((account, false));
            }

            let ttl = chrono::Duration::seconds(REFRESH_LOCK_TTL_SECS);
            if AccountService::try_lock_for_refresh(pool, id, Utc::now(), ttl).await? {
                // The previous holder may have stored new tokens since the first read
                let current = AccountService::get(pool, id).await?;
                return Ok((current, true));
            }

            log::debug!("Account {} is being refreshed elsewhere, waiting", id);
            tokio::time::sleep(REFRESH_WAIT_INTERVAL).await;
            account = AccountService::get(pool, id).await?;
        }

        Err(AppError::Conflict(format!(
            "Token refresh for account {} is still in progress",
            id
        )))
    }

    async fn publish_to_account(
        pool: &PgPool,
        ctx: &PlatformContext,
        post: &Post,
        account_id: i64,
        request: &PublishRequest,
    ) -> PublishResult {
        let account = match AccountService::get(pool, account_id).await {
            Ok(account) => account,
            Err(e) => return PublishResult::failed(account_id, None, &e),
        };
        let platform = account.platform;

        if account.tenant_id != post.tenant_id || !account.is_active {
            let err = AppError::Forbidden(format!(
                "Account {} cannot publish post {}",
                account_id, post.id
            ));
            return PublishResult::failed(account_id, Some(platform), &err);
        }

        let (account, holds_lock) = match Self::claim_token(pool, account).await {
            Ok(claimed) => claimed,
            Err(e) => return PublishResult::failed(account_id, Some(platform), &e),
        };

        let mut adapter = ctx.adapter_for(account);
        let outcome = adapter
            .post(&post.content, &request.media, &request.options)
            .await;

        // A refresh may have happened even if publishing failed afterwards
        if let Some(tokens) = adapter.take_refreshed_tokens() {
            if let Err(e) = AccountService::update_tokens(pool, account_id, &tokens).await {
                log::error!("Failed to persist refreshed tokens for account {}: {}", account_id, e);
            }
        }
        if holds_lock {
            if let Err(e) = AccountService::release_refresh_lock(pool, account_id).await {
                log::warn!("Could not release refresh lock on account {}: {}", account_id, e);
            }
        }

        match outcome {
            Ok(outcome) => {
                if let Err(e) = PostService::record_platform_post_id(
                    pool,
                    post.id,
                    platform,
                    account_id,
                    &outcome.platform_post_id,
                )
                .await
                {
                    log::error!(
                        "Published post {} to {} but could not store id {}: {}",
                        post.id,
                        platform,
                        outcome.platform_post_id,
                        e
                    );
                }

                PublishResult {
                    account_id,
                    platform: Some(platform),
                    success: true,
                    platform_post_id: Some(outcome.platform_post_id),
                    message: outcome.message,
                    reauth_required: false,
                }
            }
            Err(e) => {
                log::warn!("Publishing post {} to {} failed: {}", post.id, platform, e);
                if let PlatformError::ReauthRequired { reason, .. } = &e {
                    if let Err(db_err) =
                        AccountService::record_refresh_failure(pool, account_id, reason).await
                    {
                        log::warn!("Failed to record reauth state: {}", db_err);
                    }
                }
                PublishResult::failed(account_id, Some(platform), &AppError::Platform(e))
            }
        }
    }
}
