use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Platform;

/// Verbatim record of a verified webhook delivery
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WebhookEvent {
    pub id: i64,
    pub platform: Platform,
    pub event_type: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}
