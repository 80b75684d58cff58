use serde_json::{json, Value};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{NewNotification, Platform, PostTarget};
use crate::services::{
    AccountService, AnalyticsService, MetricService, NotificationService, PostService,
    WebhookEventService,
};
use crate::webhooks::{decode, EventKind, NormalizedEvent};

/// Result of applying one normalized event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Applied,
    /// Already applied from an earlier delivery
    Duplicate,
    /// Not about anything this system published or connected
    Unmatched,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub applied: usize,
    pub duplicates: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// Decodes a verified delivery and applies every event it carries.
///
/// Errors are logged per event and never abort the rest of the delivery.
pub async fn process_delivery(pool: &PgPool, platform: Platform, payload: &Value) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for event in decode(platform, payload) {
        match apply_event(pool, &event).await {
            Ok(ProcessOutcome::Applied) => report.applied += 1,
            Ok(ProcessOutcome::Duplicate) => {
                log::debug!("Skipping redelivered {} {} event", platform, event.event_type());
                report.duplicates += 1;
            }
            Ok(ProcessOutcome::Unmatched) => report.unmatched += 1,
            Err(e) => {
                log::error!(
                    "Failed to apply {} {} event: {:?}",
                    platform,
                    event.event_type(),
                    e
                );
                report.failed += 1;
            }
        }
    }

    if report.applied + report.duplicates + report.failed > 0 {
        log::info!(
            "{} delivery: {} applied, {} duplicate, {} unmatched, {} failed",
            platform,
            report.applied,
            report.duplicates,
            report.unmatched,
            report.failed
        );
    }
    report
}

/// Applies the domain effects of one event.
///
/// Gauges are applied on every delivery since they cannot move backwards.
/// Counter increments and notifications run in one transaction guarded by the
/// event's idempotency key.
pub async fn apply_event(pool: &PgPool, event: &NormalizedEvent) -> AppResult<ProcessOutcome> {
    let target = match &event.object_id {
        Some(object_id) => {
            PostService::find_by_platform_post_id(pool, event.platform, object_id).await?
        }
        None => None,
    };

    if event.kind == EventKind::Insights {
        return match target {
            Some(target) if !event.insights.is_empty() => {
                apply_insights(pool, event, &target).await?;
                Ok(ProcessOutcome::Applied)
            }
            _ => Ok(ProcessOutcome::Unmatched),
        };
    }

    let tenant_id = match (&target, event.kind.requires_post()) {
        (Some(target), _) => target.tenant_id,
        (None, true) => return Ok(ProcessOutcome::Unmatched),
        (None, false) => match resolve_tenant_by_account(pool, event).await? {
            Some(tenant_id) => tenant_id,
            None => return Ok(ProcessOutcome::Unmatched),
        },
    };

    let mut tx = pool.begin().await?;

    if !WebhookEventService::mark_processed(&mut *tx, event.platform, &event.event_key()).await? {
        tx.rollback().await?;
        return Ok(ProcessOutcome::Duplicate);
    }

    if let (Some(target), Some(metric)) = (&target, event.kind.counter()) {
        MetricService::increment(&mut *tx, target.post_id, event.platform, metric, 1).await?;
    }

    if let Some(notification) = notification_for(event, tenant_id, target.as_ref()) {
        NotificationService::create(&mut *tx, &notification).await?;
    }

    tx.commit().await?;
    Ok(ProcessOutcome::Applied)
}

async fn apply_insights(
    pool: &PgPool,
    event: &NormalizedEvent,
    target: &PostTarget,
) -> AppResult<()> {
    AnalyticsService::upsert_realtime(
        pool,
        target.post_id,
        target.account_id,
        event.platform,
        &event.insights,
    )
    .await?;

    for (metric, value) in event.insights.gauges() {
        MetricService::record_gauge(pool, target.post_id, event.platform, metric, value).await?;
    }
    Ok(())
}

async fn resolve_tenant_by_account(
    pool: &PgPool,
    event: &NormalizedEvent,
) -> AppResult<Option<i64>> {
    let Some(account_ref) = &event.account_ref else {
        return Ok(None);
    };
    let account =
        AccountService::find_active_by_platform_user(pool, event.platform, account_ref).await?;
    Ok(account.map(|a| a.tenant_id))
}

/// Notification for an event, with the provider snippet kept as data
pub fn notification_for(
    event: &NormalizedEvent,
    tenant_id: i64,
    target: Option<&PostTarget>,
) -> Option<NewNotification> {
    let notification_type = event.kind.notification_type()?;
    let name = event.platform.display_name();

    let (title, message) = match event.kind {
        EventKind::Comment => (
            format!("New {} Comment", name),
            format!("New comment on your {} post", name),
        ),
        EventKind::Reply => (
            format!("New {} Reply", name),
            format!("New reply to your {} post", name),
        ),
        EventKind::Like => (
            format!("New {} Like", name),
            format!("Someone liked your {} post", name),
        ),
        EventKind::Share => (
            format!("New {} Share", name),
            format!("Your {} post was shared", name),
        ),
        EventKind::Retweet => (
            format!("New {} Retweet", name),
            format!("Your {} post was retweeted", name),
        ),
        EventKind::Mention => (
            format!("New {} Mention", name),
            format!("You were mentioned on {}", name),
        ),
        EventKind::Follow => (
            format!("New {} Follower", name),
            format!("You have a new follower on {}", name),
        ),
        EventKind::DirectMessage => (
            format!("New {} Message", name),
            format!("You received a new direct message on {}", name),
        ),
        EventKind::Insights => return None,
    };

    Some(NewNotification {
        tenant_id,
        notification_type,
        platform: event.platform,
        title,
        message,
        data: json!({
            "event_type": event.event_type(),
            "post_id": target.map(|t| t.post_id),
            "object_id": event.object_id,
            "actor_id": event.actor_id,
            "actor_name": event.actor_name,
            "text": event.text,
            "event": event.raw,
        }),
    })
}
