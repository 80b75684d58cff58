//! Integration tests for the HTTP executor against a fake provider

use postbridge::error::PlatformError;
use postbridge::executor::{ApiRequest, CallContext};
use postbridge::models::Platform;
use rstest::rstest;
use serde_json::json;

use crate::common::{fast_executor, FakeProvider};

fn call() -> CallContext {
    CallContext {
        platform: Platform::Twitter,
        tenant_id: Some(7),
    }
}

#[rstest]
#[case(429)]
#[case(502)]
#[case(503)]
#[case(504)]
#[actix_web::test]
async fn test_transient_failures_are_retried_three_times(#[case] status: u16) {
    let provider = FakeProvider::responding(status, json!({ "error": { "message": "busy" } }));
    let executor = fast_executor();

    let result = executor
        .execute(call(), &ApiRequest::get(format!("{}/tweets", provider.base_url())))
        .await;

    let err = result.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(provider.hits(), 4);
}

#[rstest]
#[case(400, PlatformError::BadRequest("rejected".into()))]
#[case(401, PlatformError::Auth("rejected".into()))]
#[case(403, PlatformError::Forbidden("rejected".into()))]
#[case(404, PlatformError::NotFound("rejected".into()))]
#[case(500, PlatformError::Server { status: 500, message: "rejected".into() })]
#[actix_web::test]
async fn test_permanent_failures_are_not_retried(
    #[case] status: u16,
    #[case] expected: PlatformError,
) {
    let provider = FakeProvider::responding(status, json!({ "message": "rejected" }));
    let executor = fast_executor();

    let err = executor
        .execute(call(), &ApiRequest::post(format!("{}/tweets", provider.base_url())))
        .await
        .unwrap_err();

    assert_eq!(err, expected);
    assert_eq!(provider.hits(), 1);
}

#[actix_web::test]
async fn test_recovers_after_transient_failure() {
    let attempts = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = attempts.clone();
    let provider = FakeProvider::start(move |_path| {
        if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            (503, json!({}))
        } else {
            (200, json!({ "data": { "id": "42" } }))
        }
    });

    let response = fast_executor()
        .execute(call(), &ApiRequest::get(format!("{}/tweets/42", provider.base_url())))
        .await
        .expect("second attempt should succeed");

    assert_eq!(response.string_at("/data/id").as_deref(), Some("42"));
    assert_eq!(provider.hits(), 2);
}

#[actix_web::test]
async fn test_unreachable_host_is_network_error() {
    let executor = fast_executor();
    let err = executor
        .execute(call(), &ApiRequest::get("http://127.0.0.1:1/unreachable"))
        .await
        .unwrap_err();

    assert!(matches!(err, PlatformError::Network(_)));
}
