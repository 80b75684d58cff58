//! Outbound HTTP executor for platform APIs.
//!
//! Every platform call goes through [`HttpExecutor::execute`], which applies
//! the request timeout, retries transient failures with exponential backoff
//! and classifies the final outcome into a [`PlatformError`].

pub mod call_log;
pub mod request;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ExecutorConfig;
use crate::error::PlatformError;
use crate::models::Platform;

pub use call_log::{ApiCallLogger, ApiCallRecord, LogApiCallLogger, PgApiCallLogger};
pub use request::{ApiRequest, ApiResponse, RequestBody};

/// Longest wait applied to a provider 429 without an explicit retry-after
const MAX_RATE_LIMIT_BACKOFF_SECS: u64 = 60;

/// Who a call is made for; carried into the call log
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    pub platform: Platform,
    pub tenant_id: Option<i64>,
}

// =============================================================================
// Retry Policy
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Duration of one backoff second
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff in whole units before retry number `retry` (1-based).
    ///
    /// 429 waits the provider's `retry_after` when given, else
    /// `min(60, 2^(retry+2))`; every other retryable failure waits `2^retry`.
    pub fn backoff_units(retry: u32, error: &PlatformError) -> u64 {
        match error {
            PlatformError::RateLimited {
                retry_after: Some(secs),
                ..
            } => *secs,
            PlatformError::RateLimited { .. } => {
                2u64.saturating_pow(retry + 2).min(MAX_RATE_LIMIT_BACKOFF_SECS)
            }
            _ => 2u64.saturating_pow(retry),
        }
    }

    pub fn delay(&self, retry: u32, error: &PlatformError) -> Duration {
        let units = Self::backoff_units(retry, error);
        self.unit.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
    }
}

// =============================================================================
// Executor
// =============================================================================

pub struct HttpExecutor {
    client: reqwest::Client,
    policy: RetryPolicy,
    logger: Arc<dyn ApiCallLogger>,
}

impl HttpExecutor {
    pub fn new(
        config: &ExecutorConfig,
        logger: Arc<dyn ApiCallLogger>,
    ) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy: RetryPolicy {
                max_retries: config.max_retries,
                unit: config.backoff_unit,
            },
            logger,
        })
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Sends `request`, retrying network failures and 429/502/503/504.
    ///
    /// Waits are suspension points on the runtime, never thread sleeps.
    pub async fn execute(
        &self,
        call: CallContext,
        request: &ApiRequest,
    ) -> Result<ApiResponse, PlatformError> {
        let mut retry = 0u32;

        loop {
            let started = Instant::now();
            let outcome = self.send_once(request).await;

            self.logger
                .record(&ApiCallRecord {
                    platform: call.platform,
                    tenant_id: call.tenant_id,
                    method: request.method.to_string(),
                    url: request.url_without_query(),
                    http_code: match &outcome {
                        Ok(response) => Some(response.status),
                        Err(e) => status_of(e),
                    },
                    error: outcome.as_ref().err().map(|e| e.to_string()),
                    attempt: retry + 1,
                    duration: started.elapsed(),
                })
                .await;

            match outcome {
                Ok(response) => return Ok(response),
                Err(error) if error.is_retryable() && retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay(retry, &error);
                    log::warn!(
                        "{} {} failed ({}), retry {}/{} in {:?}",
                        request.method,
                        request.url_without_query(),
                        error,
                        retry,
                        self.policy.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, PlatformError> {
        let response = request
            .build(&self.client)?
            .send()
            .await
            .map_err(|e| PlatformError::Network(describe_transport_error(&e)))?;

        let status = response.status().as_u16();
        let header_retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(describe_transport_error(&e)))?;

        let body = request::decode_body(&text);
        let response = ApiResponse { status, body };

        if (200..300).contains(&status) {
            return Ok(response);
        }

        Err(classify_failure(status, &response.body, header_retry_after))
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}

fn status_of(error: &PlatformError) -> Option<u16> {
    match error {
        PlatformError::BadRequest(_) => Some(400),
        PlatformError::Auth(_) => Some(401),
        PlatformError::Forbidden(_) => Some(403),
        PlatformError::NotFound(_) => Some(404),
        PlatformError::RateLimited { .. } => Some(429),
        PlatformError::Server { status, .. } | PlatformError::Api { status, .. } => Some(*status),
        _ => None,
    }
}

/// Maps a non-2xx response onto the error taxonomy
pub fn classify_failure(
    status: u16,
    body: &serde_json::Value,
    header_retry_after: Option<u64>,
) -> PlatformError {
    let message = extract_error_message(body, status);

    match status {
        400 => PlatformError::BadRequest(message),
        401 => PlatformError::Auth(message),
        403 => PlatformError::Forbidden(message),
        404 => PlatformError::NotFound(message),
        429 => PlatformError::RateLimited {
            message,
            retry_after: header_retry_after.or_else(|| body_retry_after(body)),
        },
        500..=599 => PlatformError::Server { status, message },
        _ => PlatformError::Api { status, message },
    }
}

fn body_retry_after(body: &serde_json::Value) -> Option<u64> {
    let value = body
        .get("retry_after")
        .or_else(|| body.get("error").and_then(|e| e.get("retry_after")))?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Pulls a human-readable message out of the common provider error shapes
pub fn extract_error_message(body: &serde_json::Value, status: u16) -> String {
    let candidates = [
        body.get("error").and_then(|e| e.get("message")),
        body.get("error_description"),
        body.get("message"),
        body.get("error"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP Error {}", status))
}
