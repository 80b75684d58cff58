use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Comment,
    Mention,
    Like,
    Share,
    Follow,
    Dm,
    Reply,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationType::Comment => "comment",
            NotificationType::Mention => "mention",
            NotificationType::Like => "like",
            NotificationType::Share => "share",
            NotificationType::Follow => "follow",
            NotificationType::Dm => "dm",
            NotificationType::Reply => "reply",
        };
        f.write_str(s)
    }
}

/// Tenant notification derived from a webhook event; never mutated
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub tenant_id: i64,
    pub notification_type: NotificationType,
    pub platform: Platform,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub tenant_id: i64,
    pub notification_type: NotificationType,
    pub platform: Platform,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}
