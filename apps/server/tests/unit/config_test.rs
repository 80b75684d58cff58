//! Unit tests for environment configuration

use std::env;
use std::time::Duration;

use postbridge::config::{
    ExecutorConfig, PlatformConfig, PlatformEndpoints, PlatformsConfig, TokenRefreshConfig,
};
use postbridge::models::Platform;
use serial_test::serial;

fn clear(keys: &[&str]) {
    for key in keys {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_executor_defaults() {
    clear(&[
        "PLATFORM_HTTP_TIMEOUT_SECS",
        "PLATFORM_HTTP_MAX_RETRIES",
        "PLATFORM_HTTP_BACKOFF_UNIT_MS",
    ]);

    let config = ExecutorConfig::from_env();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.backoff_unit, Duration::from_secs(1));
}

#[test]
#[serial]
fn test_executor_overrides_and_bad_values() {
    env::set_var("PLATFORM_HTTP_TIMEOUT_SECS", "5");
    env::set_var("PLATFORM_HTTP_MAX_RETRIES", "not-a-number");
    env::set_var("PLATFORM_HTTP_BACKOFF_UNIT_MS", "10");

    let config = ExecutorConfig::from_env();
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.backoff_unit, Duration::from_millis(10));

    clear(&[
        "PLATFORM_HTTP_TIMEOUT_SECS",
        "PLATFORM_HTTP_MAX_RETRIES",
        "PLATFORM_HTTP_BACKOFF_UNIT_MS",
    ]);
}

#[test]
#[serial]
fn test_blank_cron_secret_is_unset() {
    env::set_var("CRON_SECRET", "   ");
    env::set_var("TOKEN_REFRESH_LOOKAHEAD_HOURS", "48");

    let config = TokenRefreshConfig::from_env();
    assert_eq!(config.cron_secret, None);
    assert_eq!(config.look_ahead, chrono::Duration::hours(48));
    assert_eq!(config.lock_ttl, chrono::Duration::seconds(300));

    clear(&["CRON_SECRET", "TOKEN_REFRESH_LOOKAHEAD_HOURS"]);
}

#[test]
#[serial]
fn test_platform_from_env_with_api_base() {
    env::set_var("TWITTER_CLIENT_ID", "tw-id");
    env::set_var("TWITTER_CLIENT_SECRET", "tw-secret");
    env::set_var("TWITTER_API_BASE", "http://127.0.0.1:9000/");
    env::remove_var("TWITTER_WEBHOOK_SECRET");

    let config = PlatformConfig::from_env(Platform::Twitter);
    assert!(config.is_configured());
    assert_eq!(config.endpoints.api_base, "http://127.0.0.1:9000");
    assert_eq!(config.endpoints.token_url, "http://127.0.0.1:9000/oauth/token");
    assert_eq!(config.webhook_signing_secret(Platform::Twitter), None);

    clear(&["TWITTER_CLIENT_ID", "TWITTER_CLIENT_SECRET", "TWITTER_API_BASE"]);
}

#[test]
#[serial]
fn test_meta_signs_with_app_secret() {
    env::set_var("FACEBOOK_CLIENT_SECRET", "app-secret");
    env::remove_var("FACEBOOK_WEBHOOK_SECRET");

    let config = PlatformConfig::from_env(Platform::Facebook);
    assert!(!config.is_configured());
    assert_eq!(
        config.webhook_signing_secret(Platform::Facebook),
        Some("app-secret")
    );

    clear(&["FACEBOOK_CLIENT_SECRET"]);
}

#[test]
fn test_default_platforms_use_production_endpoints() {
    let platforms = PlatformsConfig::default();
    for platform in Platform::ALL {
        let config = platforms.get(platform);
        assert!(!config.is_configured());
        assert!(config.endpoints.api_base.starts_with("https://"));
    }
    assert_eq!(
        PlatformEndpoints::defaults(Platform::Twitter).upload_base.as_deref(),
        Some("https://upload.twitter.com/1.1")
    );
}
