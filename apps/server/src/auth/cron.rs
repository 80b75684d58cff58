use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::Future;
use std::pin::Pin;

use crate::config::Config;
use crate::error::AppError;
use crate::webhooks::constant_time_eq;

pub const CRON_SECRET_HEADER: &str = "X-Cron-Secret";

/// Extractor guarding cron-triggered endpoints.
///
/// The request must carry the configured secret in `X-Cron-Secret`; when no
/// secret is configured the endpoints are disabled.
pub struct CronAuth;

impl FromRequest for CronAuth {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let expected = req
            .app_data::<web::Data<Config>>()
            .map(|config| config.token_refresh.cron_secret.clone());

        let provided = req
            .headers()
            .get(CRON_SECRET_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Box::pin(async move {
            let expected = expected
                .ok_or_else(|| AppError::Internal("Configuration not available".to_string()))?
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::Forbidden("Cron endpoints are disabled".to_string()))?;

            let provided = provided.ok_or_else(|| {
                AppError::Unauthorized(format!("Missing {} header", CRON_SECRET_HEADER))
            })?;

            if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
                return Err(AppError::Unauthorized("Invalid cron secret".to_string()));
            }

            Ok(CronAuth)
        })
    }
}
