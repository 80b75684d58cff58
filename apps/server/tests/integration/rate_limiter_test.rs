//! Integration tests for the Postgres-backed rate limiter

use chrono::{Duration, TimeZone, Utc};
use postbridge::models::{ActionType, Platform, RateLimitRule};
use postbridge::services::RateLimiter;

use crate::common::TestDb;

fn limiter(db: &TestDb, max: i32) -> RateLimiter {
    RateLimiter::postgres(db.pool.clone()).with_rule(
        Platform::Twitter,
        ActionType::Post,
        RateLimitRule {
            max_requests: max,
            window: Duration::minutes(15),
        },
    )
}

#[actix_web::test]
async fn test_denies_after_budget_and_resets_with_window() {
    let db = TestDb::new().await;
    let limiter = limiter(&db, 3);
    let start = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

    for i in 0..3 {
        let now = start + Duration::seconds(i);
        let status = limiter
            .check_limit_at(Platform::Twitter, 1, ActionType::Post, now)
            .await;
        assert!(status.allowed, "action {} should be allowed", i + 1);
        limiter
            .record_action_at(Platform::Twitter, 1, ActionType::Post, now)
            .await
            .expect("record should succeed");
    }

    let denied = limiter
        .check_limit_at(Platform::Twitter, 1, ActionType::Post, start + Duration::minutes(5))
        .await;
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
    assert_eq!(denied.retry_after, 600);
    assert_eq!(denied.reset_at, start + Duration::minutes(15));

    let after_reset = limiter
        .check_limit_at(Platform::Twitter, 1, ActionType::Post, start + Duration::minutes(16))
        .await;
    assert!(after_reset.allowed);
    assert_eq!(after_reset.remaining, 3);
}

#[actix_web::test]
async fn test_new_window_starts_after_reset() {
    let db = TestDb::new().await;
    let limiter = limiter(&db, 1);
    let start = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();

    limiter
        .record_action_at(Platform::Twitter, 5, ActionType::Post, start)
        .await
        .expect("record should succeed");
    let later = start + Duration::minutes(20);
    let window = limiter
        .record_action_at(Platform::Twitter, 5, ActionType::Post, later)
        .await
        .expect("record should succeed");

    assert_eq!(window.count, 1);
    assert_eq!(window.window_start, later);
    assert_eq!(window.reset_at, later + Duration::minutes(15));
}

#[actix_web::test]
async fn test_tenants_and_actions_are_isolated() {
    let db = TestDb::new().await;
    let limiter = limiter(&db, 1);
    let now = Utc::now();

    limiter
        .record_action_at(Platform::Twitter, 1, ActionType::Post, now)
        .await
        .expect("record should succeed");

    assert!(!limiter.check_limit_at(Platform::Twitter, 1, ActionType::Post, now).await.allowed);
    assert!(limiter.check_limit_at(Platform::Twitter, 2, ActionType::Post, now).await.allowed);
    assert!(limiter.check_limit_at(Platform::Twitter, 1, ActionType::Media, now).await.allowed);
}

#[actix_web::test]
async fn test_store_failure_fails_open() {
    let db = TestDb::new().await;
    let limiter = limiter(&db, 1);
    db.pool.close().await;

    let status = limiter
        .check_limit(Platform::Twitter, 1, ActionType::Post)
        .await;
    assert!(status.allowed);
    assert_eq!(status.errors.len(), 1);
}
