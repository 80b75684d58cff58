use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::AccountService;
use crate::config::TokenRefreshConfig;
use crate::error::AppResult;
use crate::models::Account;
use crate::platforms::PlatformContext;

/// Tally of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub scanned: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub reauth_required: usize,
    /// Accounts locked by a concurrent sweep
    pub skipped: usize,
}

enum Outcome {
    Refreshed,
    Failed,
    ReauthRequired,
}

pub struct TokenRefreshService;

impl TokenRefreshService {
    /// Refreshes every account whose token expires within the look-ahead window.
    ///
    /// Accounts are processed one at a time with a pause in between. Only the
    /// initial scan can fail the sweep; per-account errors are tallied.
    pub async fn run_sweep(
        pool: &PgPool,
        ctx: &PlatformContext,
        config: &TokenRefreshConfig,
    ) -> AppResult<RefreshReport> {
        let horizon = Utc::now() + config.look_ahead;
        let accounts = AccountService::list_expiring(pool, horizon).await?;

        let mut report = RefreshReport::default();
        if accounts.is_empty() {
            log::info!("No tokens expiring before {}", horizon);
            return Ok(report);
        }

        log::info!("Refreshing {} expiring token(s)", accounts.len());

        for (index, account) in accounts.into_iter().enumerate() {
            if index > 0 && !config.delay_between_accounts.is_zero() {
                tokio::time::sleep(config.delay_between_accounts).await;
            }
            report.scanned += 1;

            let account_id = account.id;
            match AccountService::try_lock_for_refresh(pool, account_id, Utc::now(), config.lock_ttl)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    log::info!("Account {} is being refreshed elsewhere, skipping", account_id);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    log::error!("Could not lock account {}: {}", account_id, e);
                    report.failed += 1;
                    continue;
                }
            }

            // A publish may have refreshed the account since the scan
            match AccountService::get(pool, account_id).await {
                Ok(current) if Self::still_due(&current, horizon, &account) => {
                    match Self::refresh_account(pool, ctx, current).await {
                        Outcome::Refreshed => report.refreshed += 1,
                        Outcome::Failed => report.failed += 1,
                        Outcome::ReauthRequired => report.reauth_required += 1,
                    }
                }
                Ok(_) => {
                    log::info!("Account {} was refreshed elsewhere, skipping", account_id);
                    report.skipped += 1;
                }
                Err(e) => {
                    log::error!("Could not reload account {}: {}", account_id, e);
                    report.failed += 1;
                }
            }

            if let Err(e) = AccountService::release_refresh_lock(pool, account_id).await {
                log::warn!("Could not release refresh lock on account {}: {}", account_id, e);
            }
        }

        log::info!(
            "Token sweep done: {} scanned, {} refreshed, {} failed, {} need reauth, {} skipped",
            report.scanned,
            report.refreshed,
            report.failed,
            report.reauth_required,
            report.skipped
        );

        Ok(report)
    }

    fn still_due(current: &Account, horizon: DateTime<Utc>, scanned: &Account) -> bool {
        current.is_active
            && current.has_refresh_token()
            && current.refresh_token == scanned.refresh_token
            && current.token_expires_at.is_some_and(|at| at <= horizon)
    }

    async fn refresh_account(pool: &PgPool, ctx: &PlatformContext, account: Account) -> Outcome {
        let account_id = account.id;
        let platform = account.platform;
        let mut adapter = ctx.adapter_for(account);

        let error = match adapter.refresh_token().await {
            Ok(tokens) => match AccountService::update_tokens(pool, account_id, &tokens).await {
                Ok(()) => {
                    log::info!("Refreshed {} token for account {}", platform, account_id);
                    return Outcome::Refreshed;
                }
                Err(e) => {
                    log::error!("Refreshed account {} but could not store tokens: {}", account_id, e);
                    return Outcome::Failed;
                }
            },
            Err(e) => e,
        };

        log::warn!("Token refresh failed for {} account {}: {}", platform, account_id, error);
        if let Err(e) =
            AccountService::record_refresh_failure(pool, account_id, &error.to_string()).await
        {
            log::warn!("Could not record refresh failure on account {}: {}", account_id, e);
        }

        if error.is_reauth() {
            Outcome::ReauthRequired
        } else {
            Outcome::Failed
        }
    }
}
