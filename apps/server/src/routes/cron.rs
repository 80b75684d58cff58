use actix_web::{web, HttpResponse};

use crate::auth::CronAuth;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::platforms::PlatformContext;
use crate::services::TokenRefreshService;

/// POST /cron/refresh-tokens - runs one token refresh sweep
pub async fn refresh_tokens(
    _auth: CronAuth,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    ctx: web::Data<PlatformContext>,
) -> AppResult<HttpResponse> {
    let report =
        TokenRefreshService::run_sweep(pool.get_ref(), ctx.get_ref(), &config.token_refresh)
            .await?;
    Ok(HttpResponse::Ok().json(report))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/cron/refresh-tokens", web::post().to(refresh_tokens));
}
