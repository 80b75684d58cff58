use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Class of platform call, each with its own budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Post,
    Media,
    Read,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::Post => "post",
            ActionType::Media => "media",
            ActionType::Read => "read",
        };
        f.write_str(s)
    }
}

/// Ceiling and window length for one (platform, action) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: i32,
    pub window: Duration,
}

/// Stored counter state for one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub count: i32,
    pub window_start: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
}

/// Answer to a limit check
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    /// Seconds until the window resets; zero when allowed
    pub retry_after: u64,
    pub reset_at: DateTime<Utc>,
    pub remaining: i32,
    pub errors: Vec<String>,
}

impl RateLimitStatus {
    /// Reset time formatted for user-facing messages
    pub fn reset_time_display(&self) -> String {
        format_reset_time(self.reset_at)
    }
}

pub fn format_reset_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
