pub mod account;
pub mod metric;
pub mod notification;
pub mod platform;
pub mod post;
pub mod rate_limit;
pub mod webhook_event;

pub use account::{Account, NewAccount, TokenSet};
pub use metric::{AnalyticsSnapshot, MetricName, PostAnalytics, PostMetric};
pub use notification::{NewNotification, Notification, NotificationType};
pub use platform::Platform;
pub use post::{NewPost, Post, PostPlatformId, PostStatus, PostTarget};
pub use rate_limit::{ActionType, RateLimitRule, RateLimitStatus, RateLimitWindow};
pub use webhook_event::WebhookEvent;
