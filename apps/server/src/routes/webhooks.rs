use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use serde_json::Value;

use crate::db::DbPool;
use crate::digest;
use crate::error::AppResult;
use crate::models::Platform;
use crate::platforms::PlatformContext;
use crate::services::WebhookEventService;
use crate::webhooks::{
    delivery_event_type, signature_header, verify_handshake, verify_signature, VerificationReply,
};

/// GET /webhooks/{platform} - subscription handshake
pub async fn verify(
    ctx: web::Data<PlatformContext>,
    path: web::Path<String>,
    query: web::Query<HashMap<String, String>>,
) -> AppResult<HttpResponse> {
    let platform: Platform = path.into_inner().parse()?;

    let response = match verify_handshake(platform, ctx.config.get(platform), &query) {
        VerificationReply::Challenge(challenge) => HttpResponse::Ok()
            .content_type("text/plain")
            .body(challenge),
        VerificationReply::Crc(crc) => HttpResponse::Ok().json(crc),
        VerificationReply::Rejected => {
            log::warn!("Rejected {} webhook verification", platform);
            HttpResponse::Forbidden().finish()
        }
    };
    Ok(response)
}

/// POST /webhooks/{platform} - event delivery
///
/// Authenticated deliveries are always acknowledged with 200; processing
/// happens in the background and its failures are only logged.
pub async fn receive(
    pool: web::Data<DbPool>,
    ctx: web::Data<PlatformContext>,
    path: web::Path<String>,
    req: HttpRequest,
    body: Bytes,
) -> AppResult<HttpResponse> {
    let platform: Platform = path.into_inner().parse()?;

    // 1. Authenticate the raw body
    let provided = req
        .headers()
        .get(signature_header(platform))
        .and_then(|h| h.to_str().ok());
    let secret = ctx.config.get(platform).webhook_signing_secret(platform);

    if !verify_signature(platform, secret, &body, provided) {
        log::warn!(
            "Rejected {} webhook: {}",
            platform,
            if provided.is_some() {
                "signature mismatch"
            } else {
                "missing signature"
            }
        );
        return Ok(HttpResponse::Forbidden().finish());
    }

    // 2. Keep the verbatim delivery for audit
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("{} webhook body is not JSON: {}", platform, e);
            Value::Null
        }
    };
    let event_type = if payload.is_null() {
        "invalid".to_string()
    } else {
        delivery_event_type(platform, &payload)
    };
    let raw = String::from_utf8_lossy(&body);

    if let Err(e) = WebhookEventService::record(pool.get_ref(), platform, &event_type, &raw).await {
        log::error!("Failed to record {} webhook: {:?}", platform, e);
    }

    // 3. Apply effects off the request path
    if !payload.is_null() {
        let pool = pool.get_ref().clone();
        tokio::spawn(async move {
            digest::process_delivery(&pool, platform, &payload).await;
        });
    }

    Ok(acknowledge(platform))
}

fn acknowledge(platform: Platform) -> HttpResponse {
    match platform {
        Platform::Facebook | Platform::Instagram => HttpResponse::Ok()
            .content_type("text/plain")
            .body("EVENT_RECEIVED"),
        Platform::Twitter | Platform::LinkedIn => HttpResponse::Ok().finish(),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/webhooks/{platform}")
            .route(web::get().to(verify))
            .route(web::post().to(receive)),
    );
}
