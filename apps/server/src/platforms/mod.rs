//! Platform adapters.
//!
//! Every social network implements [`PlatformAdapter`] on top of the shared
//! [`HttpExecutor`] and [`RateLimiter`]. The provided `post` method enforces
//! the common ordering: validate, ensure a live token, check the rate limit,
//! publish, then record the action.

pub mod facebook;
pub mod instagram;
pub mod limits;
pub mod linkedin;
pub mod oauth;
pub mod twitter;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{PlatformConfig, PlatformEndpoints, PlatformsConfig};
use crate::error::PlatformError;
use crate::executor::{ApiRequest, ApiResponse, CallContext, HttpExecutor};
use crate::models::{account, Account, ActionType, Platform, TokenSet};
use crate::models::rate_limit::format_reset_time;
use crate::services::rate_limit::RateLimiter;

pub use facebook::FacebookAdapter;
pub use instagram::InstagramAdapter;
pub use limits::{limits_for, validate_post, MediaLimits};
pub use linkedin::LinkedInAdapter;
pub use oauth::{OAuthSession, OAuthSessionStore};
pub use twitter::TwitterAdapter;

// =============================================================================
// Shared Types
// =============================================================================

/// Attachment referenced by a post
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Public URL; Meta platforms fetch media from here
    pub url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub duration_secs: Option<u32>,
    /// File contents, required by platforms that take direct uploads
    pub data: Option<bytes::Bytes>,
}

impl MediaFile {
    pub fn new(url: &str, mime_type: &str, size_bytes: u64) -> Self {
        Self {
            url: url.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes,
            duration_secs: None,
            data: None,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_data(mut self, data: bytes::Bytes) -> Self {
        self.size_bytes = data.len() as u64;
        self.data = Some(data);
        self
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.to_ascii_lowercase().starts_with("video/")
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    /// Link attached to the post (Facebook, LinkedIn)
    pub link: Option<String>,
    /// External id of the post being replied to (Twitter)
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostOutcome {
    pub success: bool,
    pub platform_post_id: String,
    pub message: String,
}

/// Identity and credentials returned by an OAuth callback
#[derive(Debug, Clone)]
pub struct OAuthGrant {
    pub tokens: TokenSet,
    pub platform_user_id: String,
    pub platform_username: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub username: String,
    pub display_name: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub error: Option<String>,
}

impl AccountInfo {
    /// Placeholder shown when the profile could not be fetched
    pub fn unknown(error: String) -> Self {
        Self {
            username: "Unknown".to_string(),
            display_name: None,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            error: Some(error),
        }
    }
}

// =============================================================================
// Context
// =============================================================================

/// Collaborators every adapter needs, injected explicitly
#[derive(Clone)]
pub struct PlatformContext {
    pub executor: Arc<HttpExecutor>,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<OAuthSessionStore>,
    pub config: Arc<PlatformsConfig>,
}

impl PlatformContext {
    pub fn new(
        executor: Arc<HttpExecutor>,
        rate_limiter: Arc<RateLimiter>,
        sessions: Arc<OAuthSessionStore>,
        config: Arc<PlatformsConfig>,
    ) -> Self {
        Self {
            executor,
            rate_limiter,
            sessions,
            config,
        }
    }

    pub fn adapter(&self, platform: Platform) -> Box<dyn PlatformAdapter> {
        create_adapter(platform, self.clone(), None)
    }

    pub fn adapter_for(&self, account: Account) -> Box<dyn PlatformAdapter> {
        create_adapter(account.platform, self.clone(), Some(account))
    }
}

/// Compile-time registry of adapters
pub fn create_adapter(
    platform: Platform,
    ctx: PlatformContext,
    account: Option<Account>,
) -> Box<dyn PlatformAdapter> {
    match platform {
        Platform::Facebook => Box::new(FacebookAdapter::new(ctx, account)),
        Platform::Instagram => Box::new(InstagramAdapter::new(ctx, account)),
        Platform::Twitter => Box::new(TwitterAdapter::new(ctx, account)),
        Platform::LinkedIn => Box::new(LinkedInAdapter::new(ctx, account)),
    }
}

/// Resolves an adapter from a platform name, rejecting unknown names
pub fn adapter_by_name(
    name: &str,
    ctx: PlatformContext,
    account: Option<Account>,
) -> Result<Box<dyn PlatformAdapter>, PlatformError> {
    let platform: Platform = name.parse()?;
    Ok(create_adapter(platform, ctx, account))
}

// =============================================================================
// Adapter Core
// =============================================================================

/// State and helpers shared by all adapters
pub struct AdapterCore {
    platform: Platform,
    ctx: PlatformContext,
    account: Option<Account>,
    refreshed: Option<TokenSet>,
}

impl AdapterCore {
    pub fn new(platform: Platform, ctx: PlatformContext, account: Option<Account>) -> Self {
        Self {
            platform,
            ctx,
            account,
            refreshed: None,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn account(&self) -> Result<&Account, PlatformError> {
        self.account.as_ref().ok_or_else(|| {
            PlatformError::Auth(format!(
                "No {} account connected",
                self.platform.display_name()
            ))
        })
    }

    pub fn account_opt(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn config(&self) -> &PlatformConfig {
        self.ctx.config.get(self.platform)
    }

    pub fn endpoints(&self) -> &PlatformEndpoints {
        &self.config().endpoints
    }

    /// Client id and secret, or `NotConfigured`
    pub fn credentials(&self) -> Result<(&str, &str), PlatformError> {
        let config = self.config();
        match (config.client_id.as_deref(), config.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(PlatformError::NotConfigured(self.platform)),
        }
    }

    pub fn sessions(&self) -> &OAuthSessionStore {
        &self.ctx.sessions
    }

    pub fn backoff_unit(&self) -> std::time::Duration {
        self.ctx.executor.policy().unit
    }

    pub async fn call(&self, request: ApiRequest) -> Result<ApiResponse, PlatformError> {
        let call = CallContext {
            platform: self.platform,
            tenant_id: self.account.as_ref().map(|a| a.tenant_id),
        };
        self.ctx.executor.execute(call, &request).await
    }

    /// Fails with `LimitReached` when the tenant's budget is spent
    pub async fn check_rate_limit(&self, action: ActionType) -> Result<(), PlatformError> {
        let tenant_id = self.account()?.tenant_id;
        let status = self
            .ctx
            .rate_limiter
            .check_limit(self.platform, tenant_id, action)
            .await;

        if status.allowed {
            return Ok(());
        }

        log::warn!(
            "{} {} denied for tenant {}: retry after {}s",
            self.platform,
            action,
            tenant_id,
            status.retry_after
        );

        Err(PlatformError::LimitReached {
            platform: self.platform,
            action,
            retry_after: status.retry_after,
            reset_at: format_reset_time(status.reset_at),
        })
    }

    /// Consumes budget after a successful call; store failures are logged only
    pub async fn record_action(&self, action: ActionType) {
        let Some(account) = self.account.as_ref() else {
            return;
        };
        if let Err(e) = self
            .ctx
            .rate_limiter
            .record_action(self.platform, account.tenant_id, action)
            .await
        {
            log::warn!("Failed to record {} {} action: {}", self.platform, action, e);
        }
    }

    /// Consumes the OAuth session for `state`
    pub fn consume_state(&self, state: &str) -> Result<OAuthSession, PlatformError> {
        self.ctx.sessions.take(state, self.platform)
    }

    pub fn apply_tokens(&mut self, tokens: TokenSet) {
        if let Some(account) = self.account.as_mut() {
            account.apply_tokens(&tokens);
        }
        self.refreshed = Some(tokens);
    }

    pub fn take_refreshed(&mut self) -> Option<TokenSet> {
        self.refreshed.take()
    }
}

/// Builds an authorization URL from the configured endpoint
pub(crate) fn authorize_url(
    core: &AdapterCore,
    params: &[(&str, &str)],
) -> Result<String, PlatformError> {
    url::Url::parse_with_params(&core.endpoints().authorize_url, params)
        .map(String::from)
        .map_err(|e| PlatformError::BadRequest(format!("Invalid authorization URL: {}", e)))
}

/// Reads `access_token`, `refresh_token` and `expires_in` from a token response
pub(crate) fn token_set_from(response: &ApiResponse) -> Result<TokenSet, PlatformError> {
    let access_token = response.require_string("/access_token")?;
    let expires_at = response
        .i64_at("/expires_in")
        .filter(|secs| *secs > 0)
        .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs));

    Ok(TokenSet {
        access_token,
        refresh_token: response.string_at("/refresh_token"),
        expires_at,
    })
}

// =============================================================================
// Adapter Contract
// =============================================================================

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn core(&self) -> &AdapterCore;

    fn core_mut(&mut self) -> &mut AdapterCore;

    /// OAuth scopes requested at authorization
    fn scopes(&self) -> &'static [&'static str];

    fn auth_url(&mut self, redirect_uri: &str, state: &str) -> Result<String, PlatformError>;

    /// Exchanges an authorization code and fetches the identity behind it
    async fn handle_callback(
        &mut self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<OAuthGrant, PlatformError>;

    /// Obtains a new access token and applies it to the in-memory account
    async fn refresh_token(&mut self) -> Result<TokenSet, PlatformError>;

    /// Platform call that creates the post; returns the external id
    async fn publish(
        &mut self,
        content: &str,
        media: &[MediaFile],
        options: &PostOptions,
    ) -> Result<String, PlatformError>;

    async fn fetch_account_info(&self) -> Result<AccountInfo, PlatformError>;

    fn platform(&self) -> Platform {
        self.core().platform()
    }

    fn character_limit(&self) -> usize {
        limits_for(self.platform()).max_characters
    }

    fn media_limits(&self) -> MediaLimits {
        limits_for(self.platform())
    }

    fn validate_post(&self, content: &str, media: &[MediaFile]) -> Vec<String> {
        validate_post(self.platform(), content, media)
    }

    fn is_token_expired(&self) -> bool {
        self.core()
            .account_opt()
            .is_some_and(|a| account::is_token_expired_at(a.token_expires_at, chrono::Utc::now()))
    }

    fn token_expiry_warning(&self) -> Option<String> {
        self.core().account_opt().and_then(Account::token_expiry_warning)
    }

    /// Tokens obtained by a refresh since the last call, for the caller to persist
    fn take_refreshed_tokens(&mut self) -> Option<TokenSet> {
        self.core_mut().take_refreshed()
    }

    /// Refreshes an expired token, or fails with `ReauthRequired` when it cannot
    async fn ensure_fresh_token(&mut self) -> Result<(), PlatformError> {
        let account = self.core().account()?;
        if !self.is_token_expired() {
            return Ok(());
        }
        if !account.has_refresh_token() {
            return Err(PlatformError::ReauthRequired {
                platform: self.platform(),
                reason: "access token has expired".to_string(),
            });
        }
        self.refresh_token().await.map(|_| ())
    }

    async fn post(
        &mut self,
        content: &str,
        media: &[MediaFile],
        options: &PostOptions,
    ) -> Result<PostOutcome, PlatformError> {
        let errors = self.validate_post(content, media);
        if !errors.is_empty() {
            return Err(PlatformError::Validation(errors));
        }

        self.core().check_rate_limit(ActionType::Post).await?;
        self.ensure_fresh_token().await?;

        let platform_post_id = self.publish(content, media, options).await?;
        self.core().record_action(ActionType::Post).await;

        Ok(PostOutcome {
            success: true,
            message: format!("Published to {}", self.platform().display_name()),
            platform_post_id,
        })
    }

    /// Profile for display; never fails
    async fn account_info(&self) -> AccountInfo {
        match self.fetch_account_info().await {
            Ok(info) => info,
            Err(e) => {
                log::warn!("{} account info unavailable: {}", self.platform(), e);
                AccountInfo::unknown(e.to_string())
            }
        }
    }
}
