use std::time::Duration;

use async_trait::async_trait;

use crate::db::DbPool;
use crate::models::Platform;

/// One outbound attempt, successful or not
#[derive(Debug, Clone)]
pub struct ApiCallRecord {
    pub platform: Platform,
    pub tenant_id: Option<i64>,
    pub method: String,
    pub url: String,
    pub http_code: Option<u16>,
    pub error: Option<String>,
    pub attempt: u32,
    pub duration: Duration,
}

/// Sink for outbound call records.
///
/// Implementations must swallow their own failures: a broken sink never
/// fails the platform call being logged.
#[async_trait]
pub trait ApiCallLogger: Send + Sync {
    async fn record(&self, call: &ApiCallRecord);
}

fn emit(call: &ApiCallRecord) {
    let code = call
        .http_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let tenant = call
        .tenant_id
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());

    match &call.error {
        None => log::info!(
            "[{}] tenant={} {} {} -> {} ({}ms, attempt {})",
            call.platform,
            tenant,
            call.method,
            call.url,
            code,
            call.duration.as_millis(),
            call.attempt
        ),
        Some(error) => log::error!(
            "[{}] tenant={} {} {} -> {} ({}ms, attempt {}): {}",
            call.platform,
            tenant,
            call.method,
            call.url,
            code,
            call.duration.as_millis(),
            call.attempt,
            error
        ),
    }
}

/// Writes call records to the application log only
#[derive(Debug, Default)]
pub struct LogApiCallLogger;

#[async_trait]
impl ApiCallLogger for LogApiCallLogger {
    async fn record(&self, call: &ApiCallRecord) {
        emit(call);
    }
}

/// Writes call records to the log and the `api_logs` table
pub struct PgApiCallLogger {
    pool: DbPool,
}

impl PgApiCallLogger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiCallLogger for PgApiCallLogger {
    async fn record(&self, call: &ApiCallRecord) {
        emit(call);

        let result = sqlx::query(
            r#"
            INSERT INTO api_logs (platform, tenant_id, method, url, http_code, error_message, attempt, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(call.platform)
        .bind(call.tenant_id)
        .bind(&call.method)
        .bind(&call.url)
        .bind(call.http_code.map(i32::from))
        .bind(&call.error)
        .bind(call.attempt as i32)
        .bind(call.duration.as_millis() as i64)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            log::warn!("Failed to persist API call log: {}", e);
        }
    }
}
