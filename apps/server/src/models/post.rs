use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Partial,
    Failed,
}

/// Tenant-owned content targeted at one or more platforms
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub tenant_id: i64,
    pub content: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub tenant_id: i64,
    pub content: String,
}

/// External identifier assigned to a post by one platform
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostPlatformId {
    pub post_id: i64,
    pub platform: Platform,
    pub account_id: i64,
    pub platform_post_id: String,
    pub published_at: DateTime<Utc>,
}

/// Post resolved from a platform-side object id
#[derive(Debug, Clone, FromRow)]
pub struct PostTarget {
    pub post_id: i64,
    pub tenant_id: i64,
    pub account_id: i64,
    pub platform: Platform,
}
