use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult, PlatformError};
use crate::models::Platform;
use crate::platforms::PlatformContext;
use crate::services::AccountService;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub auth_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub redirect_uri: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /api/tenants/{tenant_id}/connect/{platform}
pub async fn connect(
    config: web::Data<Config>,
    ctx: web::Data<PlatformContext>,
    path: web::Path<(i64, String)>,
    query: web::Query<ConnectQuery>,
) -> AppResult<HttpResponse> {
    let (tenant_id, name) = path.into_inner();
    let platform: Platform = name.parse()?;
    let redirect_uri = query
        .redirect_uri
        .clone()
        .unwrap_or_else(|| config.oauth_redirect_uri(platform));

    let state = ctx.sessions.begin(tenant_id, platform);
    let mut adapter = ctx.adapter(platform);
    let auth_url = match adapter.auth_url(&redirect_uri, &state) {
        Ok(url) => url,
        Err(e) => {
            let _ = ctx.sessions.take(&state, platform);
            return Err(e.into());
        }
    };

    Ok(HttpResponse::Ok().json(ConnectResponse { auth_url, state }))
}

/// GET /oauth/{platform}/callback
pub async fn callback(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    ctx: web::Data<PlatformContext>,
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
) -> AppResult<HttpResponse> {
    let platform: Platform = path.into_inner().parse()?;
    let query = query.into_inner();

    if let Some(error) = query.error {
        return Err(PlatformError::Auth(query.error_description.unwrap_or(error)).into());
    }
    let code = query
        .code
        .ok_or_else(|| AppError::Validation("Missing code parameter".to_string()))?;
    let state = query
        .state
        .ok_or_else(|| AppError::Validation("Missing state parameter".to_string()))?;
    let redirect_uri = query
        .redirect_uri
        .unwrap_or_else(|| config.oauth_redirect_uri(platform));

    let tenant_id = ctx.sessions.tenant_for(&state, platform)?.ok_or_else(|| {
        PlatformError::InvalidState("session was not opened for a tenant".to_string())
    })?;

    let mut adapter = ctx.adapter(platform);
    let grant = adapter
        .handle_callback(&code, &state, &redirect_uri)
        .await?;

    let account =
        AccountService::upsert_from_grant(pool.get_ref(), tenant_id, platform, &grant).await?;

    log::info!(
        "Connected {} account {} for tenant {}",
        platform,
        account.platform_user_id,
        tenant_id
    );

    Ok(HttpResponse::Ok().json(account))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api/tenants/{tenant_id}/connect/{platform}",
        web::get().to(connect),
    )
    .route("/oauth/{platform}/callback", web::get().to(callback));
}
