pub mod account;
pub mod analytics;
pub mod metric;
pub mod notification;
pub mod post;
pub mod publish;
pub mod rate_limit;
pub mod token_refresh;
pub mod webhook_event;

pub use account::AccountService;
pub use analytics::AnalyticsService;
pub use metric::MetricService;
pub use notification::NotificationService;
pub use post::PostService;
pub use publish::{PublishRequest, PublishResult, PublishService};
pub use rate_limit::{MemoryRateLimitStore, PgRateLimitStore, RateLimitStore, RateLimiter};
pub use token_refresh::{RefreshReport, TokenRefreshService};
pub use webhook_event::WebhookEventService;
