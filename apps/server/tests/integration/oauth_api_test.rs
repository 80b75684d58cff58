//! Integration tests for the OAuth connect and callback endpoints

use actix_web::{test, web, App};
use postbridge::models::Platform;
use postbridge::routes;
use postbridge::services::{AccountService, RateLimiter};
use serde_json::{json, Value};

use crate::common::{app_config, platform_context, FakeProvider, TestDb};

fn linkedin_provider() -> FakeProvider {
    FakeProvider::start(|path| match path {
        "/api/oauth/token" => (200, json!({ "access_token": "li-access", "expires_in": 5_184_000 })),
        "/api/userinfo" => (200, json!({ "sub": "abc123", "name": "Ada Lovelace" })),
        _ => (404, json!({})),
    })
}

macro_rules! oauth_app {
    ($db:expr, $provider:expr) => {{
        let ctx = platform_context(Some(&$provider.base_url()), RateLimiter::in_memory());
        let config = app_config(ctx.config.as_ref().clone(), None);
        test::init_service(
            App::new()
                .app_data(web::Data::new($db.pool.clone()))
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(ctx))
                .configure(routes::oauth::configure),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_connect_then_callback_stores_account() {
    let db = TestDb::new().await;
    let provider = linkedin_provider();
    let app = oauth_app!(db, provider);

    let req = test::TestRequest::get()
        .uri("/api/tenants/77/connect/linkedin")
        .to_request();
    let connect: Value = test::call_and_read_body_json(&app, req).await;
    let state = connect["state"].as_str().unwrap().to_string();
    let auth_url = connect["auth_url"].as_str().unwrap();
    assert!(auth_url.starts_with(&format!("{}/oauth/authorize?", provider.base_url())));
    assert!(auth_url.contains(&format!("state={}", state)));
    assert!(auth_url.contains("client_id=linkedin-client"));

    let req = test::TestRequest::get()
        .uri(&format!("/oauth/linkedin/callback?code=auth-code&state={}", state))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let account: Value = test::read_body_json(resp).await;
    assert_eq!(account["tenant_id"], json!(77));
    assert_eq!(account["platform_user_id"], json!("abc123"));

    let accounts = AccountService::list_for_tenant(&db.pool, 77).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].platform, Platform::LinkedIn);
    assert_eq!(accounts[0].access_token, "li-access");
    assert!(accounts[0].refresh_token.is_none());
    assert!(accounts[0].token_expires_at.is_some());
}

#[actix_web::test]
async fn test_state_cannot_be_replayed() {
    let db = TestDb::new().await;
    let provider = linkedin_provider();
    let app = oauth_app!(db, provider);

    let req = test::TestRequest::get()
        .uri("/api/tenants/5/connect/linkedin")
        .to_request();
    let connect: Value = test::call_and_read_body_json(&app, req).await;
    let callback = format!(
        "/oauth/linkedin/callback?code=auth-code&state={}",
        connect["state"].as_str().unwrap()
    );

    let first = test::call_service(&app, test::TestRequest::get().uri(&callback).to_request()).await;
    assert_eq!(first.status(), 200);

    let replay = test::call_service(&app, test::TestRequest::get().uri(&callback).to_request()).await;
    assert_eq!(replay.status(), 400);
    assert_eq!(db.count("accounts").await, 1);
}

#[actix_web::test]
async fn test_reconnect_updates_existing_account() {
    let db = TestDb::new().await;
    let provider = linkedin_provider();
    let app = oauth_app!(db, provider);

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/tenants/8/connect/linkedin")
            .to_request();
        let connect: Value = test::call_and_read_body_json(&app, req).await;
        let req = test::TestRequest::get()
            .uri(&format!(
                "/oauth/linkedin/callback?code=c&state={}",
                connect["state"].as_str().unwrap()
            ))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }

    assert_eq!(db.count("accounts").await, 1);
}

#[actix_web::test]
async fn test_provider_denial_is_unauthorized() {
    let db = TestDb::new().await;
    let provider = linkedin_provider();
    let app = oauth_app!(db, provider);

    let req = test::TestRequest::get()
        .uri("/oauth/linkedin/callback?error=user_cancelled_login&error_description=The+member+declined")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    assert_eq!(provider.hits(), 0);
}

#[actix_web::test]
async fn test_unknown_state_is_bad_request() {
    let db = TestDb::new().await;
    let provider = linkedin_provider();
    let app = oauth_app!(db, provider);

    let req = test::TestRequest::get()
        .uri("/oauth/linkedin/callback?code=c&state=forged")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(provider.hits(), 0);
}
