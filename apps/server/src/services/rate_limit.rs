use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::models::{ActionType, Platform, RateLimitRule, RateLimitStatus, RateLimitWindow};

/// Key of one counter window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub platform: Platform,
    pub tenant_id: i64,
    pub action: ActionType,
}

#[derive(Debug, thiserror::Error)]
#[error("Rate limit store error: {0}")]
pub struct StoreError(String);

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError(e.to_string())
    }
}

// =============================================================================
// Default Rules
// =============================================================================

/// Budgets per platform and action class
pub fn default_rule(platform: Platform, action: ActionType) -> RateLimitRule {
    use ActionType::*;
    use Platform::*;

    let (max_requests, window_secs) = match (platform, action) {
        (Facebook, Post) => (50, 3_600),
        (Facebook, Media) => (50, 3_600),
        (Facebook, Read) => (200, 3_600),
        (Instagram, Post) => (25, 86_400),
        (Instagram, Media) => (50, 86_400),
        (Instagram, Read) => (200, 3_600),
        (Twitter, Post) => (300, 10_800),
        (Twitter, Media) => (500, 10_800),
        (Twitter, Read) => (900, 900),
        (LinkedIn, Post) => (100, 86_400),
        (LinkedIn, Media) => (100, 86_400),
        (LinkedIn, Read) => (500, 86_400),
    };

    RateLimitRule {
        max_requests,
        window: Duration::seconds(window_secs),
    }
}

// =============================================================================
// Stores
// =============================================================================

/// Persistence for counter windows.
///
/// `increment` must be atomic: concurrent callers on the same key never lose
/// an update, and an elapsed window is reset within the same operation.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn current(&self, key: &RateLimitKey) -> Result<Option<RateLimitWindow>, StoreError>;

    async fn increment(
        &self,
        key: &RateLimitKey,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitWindow, StoreError>;
}

/// Windows stored in the `rate_limits` table, shared by every process
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn current(&self, key: &RateLimitKey) -> Result<Option<RateLimitWindow>, StoreError> {
        let row: Option<(i32, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT request_count, window_start, reset_at
            FROM rate_limits
            WHERE platform = $1 AND tenant_id = $2 AND action_type = $3
            "#,
        )
        .bind(key.platform)
        .bind(key.tenant_id)
        .bind(key.action)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(count, window_start, reset_at)| RateLimitWindow {
            count,
            window_start,
            reset_at,
        }))
    }

    async fn increment(
        &self,
        key: &RateLimitKey,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitWindow, StoreError> {
        // Single statement: reset-if-elapsed and increment cannot interleave
        let (count, window_start, reset_at): (i32, DateTime<Utc>, DateTime<Utc>) =
            sqlx::query_as(
                r#"
                INSERT INTO rate_limits (platform, tenant_id, action_type, request_count, window_start, reset_at)
                VALUES ($1, $2, $3, 1, $4, $5)
                ON CONFLICT (platform, tenant_id, action_type) DO UPDATE SET
                    request_count = CASE
                        WHEN rate_limits.reset_at <= EXCLUDED.window_start THEN 1
                        ELSE rate_limits.request_count + 1
                    END,
                    window_start = CASE
                        WHEN rate_limits.reset_at <= EXCLUDED.window_start THEN EXCLUDED.window_start
                        ELSE rate_limits.window_start
                    END,
                    reset_at = CASE
                        WHEN rate_limits.reset_at <= EXCLUDED.window_start THEN EXCLUDED.reset_at
                        ELSE rate_limits.reset_at
                    END
                RETURNING request_count, window_start, reset_at
                "#,
            )
            .bind(key.platform)
            .bind(key.tenant_id)
            .bind(key.action)
            .bind(now)
            .bind(now + rule.window)
            .fetch_one(&self.pool)
            .await?;

        Ok(RateLimitWindow {
            count,
            window_start,
            reset_at,
        })
    }
}

/// Process-local windows for single-node deployments and tests
#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<RateLimitKey, RateLimitWindow>>,
}

impl MemoryRateLimitStore {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<RateLimitKey, RateLimitWindow>>, StoreError>
    {
        self.windows
            .lock()
            .map_err(|_| StoreError("rate limit state poisoned".to_string()))
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn current(&self, key: &RateLimitKey) -> Result<Option<RateLimitWindow>, StoreError> {
        Ok(self.lock()?.get(key).copied())
    }

    async fn increment(
        &self,
        key: &RateLimitKey,
        rule: &RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitWindow, StoreError> {
        let mut windows = self.lock()?;
        let window = windows
            .entry(*key)
            .and_modify(|w| {
                if w.reset_at <= now {
                    *w = RateLimitWindow {
                        count: 1,
                        window_start: now,
                        reset_at: now + rule.window,
                    };
                } else {
                    w.count += 1;
                }
            })
            .or_insert(RateLimitWindow {
                count: 1,
                window_start: now,
                reset_at: now + rule.window,
            });
        Ok(*window)
    }
}

// =============================================================================
// Rate Limiter
// =============================================================================

/// Per (platform, tenant, action) budget keeper consulted by adapters
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    overrides: HashMap<(Platform, ActionType), RateLimitRule>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            overrides: HashMap::new(),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgRateLimitStore::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRateLimitStore::default()))
    }

    /// Replaces the default budget for one platform/action pair
    pub fn with_rule(mut self, platform: Platform, action: ActionType, rule: RateLimitRule) -> Self {
        self.overrides.insert((platform, action), rule);
        self
    }

    pub fn rule(&self, platform: Platform, action: ActionType) -> RateLimitRule {
        self.overrides
            .get(&(platform, action))
            .copied()
            .unwrap_or_else(|| default_rule(platform, action))
    }

    pub async fn check_limit(
        &self,
        platform: Platform,
        tenant_id: i64,
        action: ActionType,
    ) -> RateLimitStatus {
        self.check_limit_at(platform, tenant_id, action, Utc::now())
            .await
    }

    /// Whether one more action fits in the current window.
    ///
    /// A store failure is reported in `errors` and the call is allowed; the
    /// provider's own 429 handling still applies downstream.
    pub async fn check_limit_at(
        &self,
        platform: Platform,
        tenant_id: i64,
        action: ActionType,
        now: DateTime<Utc>,
    ) -> RateLimitStatus {
        let rule = self.rule(platform, action);
        let key = RateLimitKey {
            platform,
            tenant_id,
            action,
        };

        let window = match self.store.current(&key).await {
            Ok(window) => window,
            Err(e) => {
                log::warn!("{} {} limit check failed open: {}", platform, action, e);
                return RateLimitStatus {
                    allowed: true,
                    retry_after: 0,
                    reset_at: now + rule.window,
                    remaining: rule.max_requests,
                    errors: vec![e.to_string()],
                };
            }
        };

        match window {
            Some(w) if w.reset_at > now && w.count >= rule.max_requests => {
                let seconds_left = (w.reset_at - now).num_milliseconds();
                let retry_after = ((seconds_left + 999) / 1000).max(1) as u64;
                RateLimitStatus {
                    allowed: false,
                    retry_after,
                    reset_at: w.reset_at,
                    remaining: 0,
                    errors: vec![format!(
                        "{} {} limit of {} per {} minutes reached",
                        platform.display_name(),
                        action,
                        rule.max_requests,
                        rule.window.num_minutes()
                    )],
                }
            }
            Some(w) if w.reset_at > now => RateLimitStatus {
                allowed: true,
                retry_after: 0,
                reset_at: w.reset_at,
                remaining: rule.max_requests - w.count,
                errors: Vec::new(),
            },
            _ => RateLimitStatus {
                allowed: true,
                retry_after: 0,
                reset_at: now + rule.window,
                remaining: rule.max_requests,
                errors: Vec::new(),
            },
        }
    }

    /// Consumes one unit of budget; call only after the action succeeded
    pub async fn record_action(
        &self,
        platform: Platform,
        tenant_id: i64,
        action: ActionType,
    ) -> Result<RateLimitWindow, StoreError> {
        self.record_action_at(platform, tenant_id, action, Utc::now())
            .await
    }

    pub async fn record_action_at(
        &self,
        platform: Platform,
        tenant_id: i64,
        action: ActionType,
        now: DateTime<Utc>,
    ) -> Result<RateLimitWindow, StoreError> {
        let rule = self.rule(platform, action);
        let key = RateLimitKey {
            platform,
            tenant_id,
            action,
        };
        self.store.increment(&key, &rule, now).await
    }
}
