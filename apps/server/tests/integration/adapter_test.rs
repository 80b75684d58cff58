//! Integration tests for platform adapters against a fake provider

use chrono::{Duration, Utc};
use postbridge::error::PlatformError;
use postbridge::models::{ActionType, Platform, RateLimitRule};
use postbridge::platforms::{MediaFile, PlatformAdapter, PostOptions};
use postbridge::services::RateLimiter;
use serde_json::json;

use crate::common::{account, platform_context, FakeProvider};

#[actix_web::test]
async fn test_twitter_post_publishes_and_consumes_budget() {
    let provider = FakeProvider::start(|path| match path {
        "/api/tweets" => (201, json!({ "data": { "id": "1789", "text": "hi" } })),
        _ => (404, json!({ "error": "not found" })),
    });
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let mut adapter = ctx.adapter_for(account(Platform::Twitter, 3));
    let outcome = adapter
        .post("Shipping today", &[], &PostOptions::default())
        .await
        .expect("post should succeed");

    assert!(outcome.success);
    assert_eq!(outcome.platform_post_id, "1789");
    assert_eq!(provider.hits(), 1);

    let status = ctx
        .rate_limiter
        .check_limit(Platform::Twitter, 3, ActionType::Post)
        .await;
    let rule = ctx.rate_limiter.rule(Platform::Twitter, ActionType::Post);
    assert_eq!(status.remaining, rule.max_requests - 1);
}

#[actix_web::test]
async fn test_expired_linkedin_token_requires_reauth_without_calls() {
    let provider = FakeProvider::responding(200, json!({ "id": "urn:li:share:1" }));
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let mut linkedin = account(Platform::LinkedIn, 9);
    linkedin.token_expires_at = Some(Utc::now() - Duration::hours(1));
    let mut adapter = ctx.adapter_for(linkedin);

    assert!(adapter.is_token_expired());
    let err = adapter
        .post("Quarterly update", &[], &PostOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_reauth());
    assert_eq!(provider.hits(), 0);
}

#[actix_web::test]
async fn test_exhausted_budget_blocks_before_any_call() {
    let provider = FakeProvider::responding(200, json!({ "id": "ig-media" }));
    let limiter = RateLimiter::in_memory().with_rule(
        Platform::Instagram,
        ActionType::Post,
        RateLimitRule {
            max_requests: 1,
            window: Duration::hours(1),
        },
    );
    limiter
        .record_action(Platform::Instagram, 42, ActionType::Post)
        .await
        .expect("record should succeed");
    let ctx = platform_context(Some(&provider.base_url()), limiter);

    let mut adapter = ctx.adapter_for(account(Platform::Instagram, 42));
    let image = MediaFile::new("https://cdn.example.com/a.jpg", "image/jpeg", 1024);
    let err = adapter
        .post("Sunset", &[image], &PostOptions::default())
        .await
        .unwrap_err();

    match &err {
        PlatformError::LimitReached {
            platform,
            action,
            retry_after,
            ..
        } => {
            assert_eq!(*platform, Platform::Instagram);
            assert_eq!(*action, ActionType::Post);
            assert!(*retry_after > 0 && *retry_after <= 3600);
        }
        other => panic!("expected LimitReached, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("Retry after"));
    assert!(message.contains("UTC"));
    assert_eq!(provider.hits(), 0);
}

#[actix_web::test]
async fn test_invalid_content_is_rejected_locally() {
    let provider = FakeProvider::responding(200, json!({}));
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let mut adapter = ctx.adapter_for(account(Platform::Twitter, 1));
    let err = adapter
        .post(&"x".repeat(281), &[], &PostOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::Validation(_)));
    assert_eq!(provider.hits(), 0);
}

#[actix_web::test]
async fn test_account_info_falls_back_to_unknown() {
    let provider = FakeProvider::responding(500, json!({ "error": { "message": "down" } }));
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let adapter = ctx.adapter_for(account(Platform::Facebook, 1));
    let info = adapter.account_info().await;

    assert_eq!(info.username, "Unknown");
    assert!(info.error.is_some());
}

#[actix_web::test]
async fn test_twitter_refresh_applies_new_tokens() {
    let provider = FakeProvider::start(|path| match path {
        "/api/oauth/token" => (
            200,
            json!({ "access_token": "fresh", "refresh_token": "rotated", "expires_in": 7200 }),
        ),
        _ => (404, json!({})),
    });
    let ctx = platform_context(Some(&provider.base_url()), RateLimiter::in_memory());

    let mut twitter = account(Platform::Twitter, 1);
    twitter.refresh_token = Some("old-refresh".to_string());
    twitter.token_expires_at = Some(Utc::now() - Duration::minutes(5));
    let mut adapter = ctx.adapter_for(twitter);

    adapter.ensure_fresh_token().await.expect("refresh should succeed");

    let tokens = adapter.take_refreshed_tokens().expect("tokens to persist");
    assert_eq!(tokens.access_token, "fresh");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rotated"));
    assert!(!adapter.is_token_expired());
}

#[actix_web::test]
async fn test_denied_post_skips_token_refresh() {
    let provider = FakeProvider::start(|path| match path {
        "/api/oauth/token" => (
            200,
            json!({ "access_token": "fresh", "refresh_token": "rotated", "expires_in": 7200 }),
        ),
        _ => (201, json!({ "data": { "id": "1" } })),
    });
    let limiter = RateLimiter::in_memory().with_rule(
        Platform::Twitter,
        ActionType::Post,
        RateLimitRule {
            max_requests: 1,
            window: Duration::hours(1),
        },
    );
    limiter
        .record_action(Platform::Twitter, 5, ActionType::Post)
        .await
        .expect("record should succeed");
    let ctx = platform_context(Some(&provider.base_url()), limiter);

    let mut twitter = account(Platform::Twitter, 5);
    twitter.refresh_token = Some("old-refresh".to_string());
    twitter.token_expires_at = Some(Utc::now() - Duration::minutes(5));
    let mut adapter = ctx.adapter_for(twitter);

    let err = adapter
        .post("Over budget", &[], &PostOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::LimitReached { .. }));
    assert_eq!(provider.hits(), 0);
    assert!(adapter.take_refreshed_tokens().is_none());
    assert!(adapter.is_token_expired());
}
