use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Platform;

/// A connected social identity owned by a tenant
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub tenant_id: i64,
    pub platform: Platform,
    pub platform_user_id: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub is_active: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub last_refresh_error: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for storing a newly connected account
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub tenant_id: i64,
    pub platform: Platform,
    pub platform_user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default = "empty_metadata")]
    pub metadata: serde_json::Value,
}

fn empty_metadata() -> serde_json::Value {
    serde_json::json!({})
}

/// Credentials produced by a token exchange or refresh
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_token_expired(&self) -> bool {
        is_token_expired_at(self.token_expires_at, Utc::now())
    }

    pub fn token_expiry_warning(&self) -> Option<String> {
        token_expiry_warning_at(self.token_expires_at, Utc::now())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// String field from the metadata blob
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Replaces the in-memory credentials after a refresh
    pub fn apply_tokens(&mut self, tokens: &TokenSet) {
        self.access_token = tokens.access_token.clone();
        if tokens.refresh_token.is_some() {
            self.refresh_token = tokens.refresh_token.clone();
        }
        self.token_expires_at = tokens.expires_at;
    }
}

/// An absent expiry means the token never expires.
pub fn is_token_expired_at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| at <= now)
}

/// Warning shown once a token is within seven days of expiry
pub fn token_expiry_warning_at(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<String> {
    let remaining = expires_at? - now;

    if remaining <= Duration::zero() {
        return Some("Token has expired".to_string());
    }

    if remaining <= Duration::hours(24) {
        // Round partial hours up so "expires in 0 hours" never appears
        let hours = (remaining.num_seconds() + 3599) / 3600;
        return Some(format!(
            "Token expires in {} hour{}",
            hours,
            if hours == 1 { "" } else { "s" }
        ));
    }

    if remaining <= Duration::days(7) {
        let days = remaining.num_days().max(1);
        return Some(format!(
            "Token expires in {} day{}",
            days,
            if days == 1 { "" } else { "s" }
        ));
    }

    None
}
