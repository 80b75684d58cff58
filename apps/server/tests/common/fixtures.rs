//! Test fixtures and data builders
//!
//! Accounts, published posts, platform contexts and a fake provider server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpResponse};
use chrono::{DateTime, Utc};
use postbridge::config::{
    Config, DatabaseConfig, ExecutorConfig, PlatformConfig, PlatformEndpoints, PlatformsConfig,
    TokenRefreshConfig,
};
use postbridge::executor::{HttpExecutor, LogApiCallLogger};
use postbridge::models::{Account, NewAccount, NewPost, Platform};
use postbridge::platforms::{OAuthSessionStore, PlatformContext};
use postbridge::services::{AccountService, PostService, RateLimiter};
use postbridge::webhooks::compute_signature;
use serde_json::{json, Value};
use sqlx::PgPool;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const VERIFY_TOKEN: &str = "test-verify-token";

/// Executor that retries fast: one backoff unit is a millisecond
pub fn fast_executor() -> HttpExecutor {
    let config = ExecutorConfig {
        timeout: Duration::from_secs(5),
        max_retries: 3,
        backoff_unit: Duration::from_millis(1),
    };
    HttpExecutor::new(&config, Arc::new(LogApiCallLogger)).expect("Failed to build executor")
}

/// Every platform configured with test credentials; endpoints rooted at `base` when given
pub fn platforms_config(base: Option<&str>) -> PlatformsConfig {
    let mut config = PlatformsConfig::default();
    for platform in Platform::ALL {
        let entry: &mut PlatformConfig = config.get_mut(platform);
        entry.client_id = Some(format!("{}-client", platform));
        entry.client_secret = Some(format!("{}-secret", platform));
        entry.webhook_verify_token = Some(VERIFY_TOKEN.to_string());
        entry.webhook_secret = Some(WEBHOOK_SECRET.to_string());
        if let Some(base) = base {
            entry.endpoints = PlatformEndpoints::rooted_at(base);
        }
    }
    config
}

/// Application config around `platforms`; the database section is never used to connect
pub fn app_config(platforms: PlatformsConfig, cron_secret: Option<&str>) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        public_url: "http://localhost:8080".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(1),
            max_lifetime: Duration::from_secs(1),
        },
        executor: ExecutorConfig::default(),
        platforms,
        token_refresh: TokenRefreshConfig {
            cron_secret: cron_secret.map(str::to_string),
            delay_between_accounts: Duration::ZERO,
            ..TokenRefreshConfig::default()
        },
    }
}

pub fn platform_context(base: Option<&str>, rate_limiter: RateLimiter) -> PlatformContext {
    PlatformContext::new(
        Arc::new(fast_executor()),
        Arc::new(rate_limiter),
        Arc::new(OAuthSessionStore::default()),
        Arc::new(platforms_config(base)),
    )
}

/// In-memory account, never persisted
pub fn account(platform: Platform, tenant_id: i64) -> Account {
    Account {
        id: 1,
        tenant_id,
        platform,
        platform_user_id: "user-1".to_string(),
        display_name: Some("Test".to_string()),
        access_token: "access-token".to_string(),
        refresh_token: None,
        token_expires_at: None,
        metadata: json!({}),
        is_active: true,
        last_refreshed_at: None,
        last_refresh_error: None,
        refresh_locked_until: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub async fn insert_account(
    pool: &PgPool,
    tenant_id: i64,
    platform: Platform,
    platform_user_id: &str,
    refresh_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Account {
    AccountService::create(
        pool,
        NewAccount {
            tenant_id,
            platform,
            platform_user_id: platform_user_id.to_string(),
            display_name: Some(format!("{} user", platform)),
            access_token: "stored-access-token".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            token_expires_at: expires_at,
            metadata: json!({}),
        },
    )
    .await
    .expect("Failed to create account")
}

/// A post already published to `platform` under `platform_post_id`; returns the post id
pub async fn insert_published_post(
    pool: &PgPool,
    account: &Account,
    platform_post_id: &str,
) -> i64 {
    let post = PostService::create(
        pool,
        NewPost {
            tenant_id: account.tenant_id,
            content: "Hello from the tests".to_string(),
        },
    )
    .await
    .expect("Failed to create post");

    PostService::record_platform_post_id(
        pool,
        post.id,
        account.platform,
        account.id,
        platform_post_id,
    )
    .await
    .expect("Failed to record platform post id");

    post.id
}

/// Signature header name and value for `body`
pub fn sign(platform: Platform, body: &str) -> (&'static str, String) {
    (
        postbridge::webhooks::signature_header(platform),
        compute_signature(platform, WEBHOOK_SECRET, body.as_bytes()),
    )
}

// =============================================================================
// Fake provider
// =============================================================================

/// Scripted provider API served on a local port
pub struct FakeProvider {
    pub server: actix_test::TestServer,
    hits: Arc<AtomicUsize>,
}

impl FakeProvider {
    /// Answers every request with `status` and `body`
    pub fn responding(status: u16, body: Value) -> Self {
        Self::start(move |_path| (status, body.clone()))
    }

    /// Answers each request from `route(path)`
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&str) -> (u16, Value) + Send + Sync + Clone + 'static,
    {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let server = actix_test::start(move || {
            let counter = counter.clone();
            let route = route.clone();
            App::new().default_service(web::to(move |req: actix_web::HttpRequest| {
                let counter = counter.clone();
                let route = route.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let (status, body) = route(req.path());
                    HttpResponse::build(
                        actix_web::http::StatusCode::from_u16(status)
                            .expect("Invalid status code"),
                    )
                    .json(body)
                }
            }))
        });

        Self { server, hits }
    }

    /// Base URL for `PlatformEndpoints::rooted_at`
    pub fn base_url(&self) -> String {
        self.server.url("/api")
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
