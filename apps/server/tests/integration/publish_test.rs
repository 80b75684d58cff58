//! Integration tests for publishing a post to several accounts

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use postbridge::models::{NewPost, Platform, PostStatus, TokenSet};
use postbridge::platforms::PostOptions;
use postbridge::services::{
    AccountService, PostService, PublishRequest, PublishService, RateLimiter, TokenRefreshService,
};
use serde_json::json;

use crate::common::{app_config, insert_account, platform_context, FakeProvider, TestDb};

fn request(post_id: i64, account_ids: Vec<i64>) -> PublishRequest {
    PublishRequest {
        post_id,
        account_ids,
        media: Vec::new(),
        options: PostOptions::default(),
    }
}

async fn new_post(db: &TestDb, tenant_id: i64) -> i64 {
    PostService::create(
        &db.pool,
        NewPost {
            tenant_id,
            content: "Launch day".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

#[actix_web::test]
async fn test_partial_success_keeps_successful_ids() {
    let db = TestDb::new().await;
    let provider = FakeProvider::start(|path| match path {
        "/api/tweets" => (201, json!({ "data": { "id": "tw-9" } })),
        _ => (404, json!({})),
    });
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let twitter = insert_account(&db.pool, 1, Platform::Twitter, "tw", None, None).await;
    let linkedin = insert_account(
        &db.pool,
        1,
        Platform::LinkedIn,
        "li",
        None,
        Some(Utc::now() - Duration::days(1)),
    )
    .await;
    let post_id = new_post(&db, 1).await;

    let results = PublishService::publish(
        &db.pool,
        &ctx,
        &request(post_id, vec![twitter.id, linkedin.id]),
    )
    .await
    .unwrap();

    assert!(results[0].success);
    assert_eq!(results[0].platform_post_id.as_deref(), Some("tw-9"));
    assert!(!results[1].success);
    assert!(results[1].reauth_required);

    let post = PostService::get(&db.pool, post_id).await.unwrap();
    assert_eq!(post.status, PostStatus::Partial);

    let ids = PostService::platform_post_ids(&db.pool, post_id).await.unwrap();
    assert_eq!(ids.get(&Platform::Twitter).map(String::as_str), Some("tw-9"));
    assert!(!ids.contains_key(&Platform::LinkedIn));

    let stored = AccountService::get(&db.pool, linkedin.id).await.unwrap();
    assert!(stored.last_refresh_error.is_some());
}

#[actix_web::test]
async fn test_foreign_account_is_refused() {
    let db = TestDb::new().await;
    let provider = FakeProvider::responding(201, json!({ "data": { "id": "x" } }));
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let other_tenant = insert_account(&db.pool, 2, Platform::Twitter, "tw", None, None).await;
    let post_id = new_post(&db, 1).await;

    let results = PublishService::publish(&db.pool, &ctx, &request(post_id, vec![other_tenant.id]))
        .await
        .unwrap();

    assert!(!results[0].success);
    assert_eq!(provider.hits(), 0);
    assert_eq!(
        PostService::get(&db.pool, post_id).await.unwrap().status,
        PostStatus::Failed
    );
}

#[actix_web::test]
async fn test_empty_account_list_is_rejected() {
    let db = TestDb::new().await;
    let ctx = platform_context(None, RateLimiter::in_memory());
    let post_id = new_post(&db, 1).await;

    let result = PublishService::publish(&db.pool, &ctx, &request(post_id, Vec::new())).await;
    assert!(result.is_err());
}

/// Token endpoint that rotates the refresh token once, like Twitter
fn rotating_twitter(token_calls: Arc<AtomicUsize>) -> FakeProvider {
    FakeProvider::start(move |path| match path {
        "/api/oauth/token" => {
            if token_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                (
                    200,
                    json!({ "access_token": "rotated-access", "refresh_token": "r-2", "expires_in": 7200 }),
                )
            } else {
                (400, json!({ "error": "invalid_grant", "error_description": "token revoked" }))
            }
        }
        "/api/tweets" => (201, json!({ "data": { "id": "tw-1" } })),
        _ => (404, json!({})),
    })
}

#[actix_web::test]
async fn test_publish_waits_for_refresh_in_progress() {
    let db = TestDb::new().await;
    let token_calls = Arc::new(AtomicUsize::new(0));
    let provider = rotating_twitter(token_calls.clone());
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let account = insert_account(
        &db.pool,
        1,
        Platform::Twitter,
        "tw",
        Some("r-1"),
        Some(Utc::now() - Duration::minutes(1)),
    )
    .await;
    let post_id = new_post(&db, 1).await;

    // Another worker holds the lock and stores rotated tokens shortly after
    assert!(
        AccountService::try_lock_for_refresh(&db.pool, account.id, Utc::now(), Duration::minutes(5))
            .await
            .unwrap()
    );
    let pool = db.pool.clone();
    let account_id = account.id;
    let holder = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        let tokens = TokenSet {
            access_token: "rotated-access".to_string(),
            refresh_token: Some("r-2".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(2)),
        };
        AccountService::update_tokens(&pool, account_id, &tokens).await.unwrap();
        AccountService::release_refresh_lock(&pool, account_id).await.unwrap();
    });

    let results = PublishService::publish(&db.pool, &ctx, &request(post_id, vec![account.id]))
        .await
        .unwrap();
    holder.await.unwrap();

    assert!(results[0].success, "{}", results[0].message);
    assert!(!results[0].reauth_required);
    assert_eq!(token_calls.load(Ordering::SeqCst), 0);

    let stored = AccountService::get(&db.pool, account.id).await.unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("r-2"));
    assert!(stored.last_refresh_error.is_none());
}

#[actix_web::test]
async fn test_concurrent_sweep_and_publish_refresh_once() {
    let db = TestDb::new().await;
    let token_calls = Arc::new(AtomicUsize::new(0));
    let provider = rotating_twitter(token_calls.clone());
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());
    let config = app_config(ctx.config.as_ref().clone(), None).token_refresh;

    let account = insert_account(
        &db.pool,
        1,
        Platform::Twitter,
        "tw",
        Some("r-1"),
        Some(Utc::now() - Duration::minutes(1)),
    )
    .await;
    let post_id = new_post(&db, 1).await;
    let publish_request = request(post_id, vec![account.id]);

    let (report, results) = tokio::join!(
        TokenRefreshService::run_sweep(&db.pool, &ctx, &config),
        PublishService::publish(&db.pool, &ctx, &publish_request),
    );
    let report = report.unwrap();
    let results = results.unwrap();

    assert_eq!(token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.reauth_required, 0);
    assert_eq!(report.failed, 0);
    assert!(results[0].success, "{}", results[0].message);

    let stored = AccountService::get(&db.pool, account.id).await.unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("r-2"));
    assert!(stored.last_refresh_error.is_none());
    assert!(stored.refresh_locked_until.is_none());
}

#[actix_web::test]
async fn test_publish_releases_refresh_lock() {
    let db = TestDb::new().await;
    let token_calls = Arc::new(AtomicUsize::new(0));
    let provider = rotating_twitter(token_calls.clone());
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let account = insert_account(
        &db.pool,
        1,
        Platform::Twitter,
        "tw",
        Some("r-1"),
        Some(Utc::now() - Duration::minutes(1)),
    )
    .await;
    let post_id = new_post(&db, 1).await;

    let results = PublishService::publish(&db.pool, &ctx, &request(post_id, vec![account.id]))
        .await
        .unwrap();

    assert!(results[0].success);
    assert_eq!(token_calls.load(Ordering::SeqCst), 1);
    let stored = AccountService::get(&db.pool, account.id).await.unwrap();
    assert_eq!(stored.access_token, "rotated-access");
    assert!(stored.refresh_locked_until.is_none());
}
