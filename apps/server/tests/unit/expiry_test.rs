//! Unit tests for token expiry helpers

use chrono::{Duration, TimeZone, Utc};
use postbridge::models::account::{is_token_expired_at, token_expiry_warning_at};

#[test]
fn test_missing_expiry_never_expires() {
    let now = Utc::now();
    assert!(!is_token_expired_at(None, now));
    assert_eq!(token_expiry_warning_at(None, now), None);
}

#[test]
fn test_past_expiry_is_expired() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    assert!(is_token_expired_at(Some(now - Duration::seconds(1)), now));
    assert!(is_token_expired_at(Some(now), now));
    assert!(!is_token_expired_at(Some(now + Duration::seconds(1)), now));
    assert_eq!(
        token_expiry_warning_at(Some(now - Duration::hours(1)), now).as_deref(),
        Some("Token has expired")
    );
}

#[test]
fn test_warning_in_hours_within_a_day() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    assert_eq!(
        token_expiry_warning_at(Some(now + Duration::hours(5)), now).as_deref(),
        Some("Token expires in 5 hours")
    );
    assert_eq!(
        token_expiry_warning_at(Some(now + Duration::minutes(20)), now).as_deref(),
        Some("Token expires in 1 hour")
    );
}

#[test]
fn test_warning_in_days_within_a_week() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    assert_eq!(
        token_expiry_warning_at(Some(now + Duration::days(3)), now).as_deref(),
        Some("Token expires in 3 days")
    );
    assert_eq!(
        token_expiry_warning_at(Some(now + Duration::days(7)), now).as_deref(),
        Some("Token expires in 7 days")
    );
    assert_eq!(token_expiry_warning_at(Some(now + Duration::days(8)), now), None);
}
