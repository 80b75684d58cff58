//! Per-platform delivery shapes decoded into [`NormalizedEvent`]s.
//!
//! The processor only ever sees normalized events; provider JSON paths stay
//! in this module.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::{AnalyticsSnapshot, MetricName, NotificationType, Platform};

/// Longest idempotency key stored verbatim
const MAX_EVENT_KEY_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Comment,
    Reply,
    Like,
    Share,
    Retweet,
    Mention,
    Follow,
    DirectMessage,
    Insights,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Comment => "comment",
            EventKind::Reply => "reply",
            EventKind::Like => "like",
            EventKind::Share => "share",
            EventKind::Retweet => "retweet",
            EventKind::Mention => "mention",
            EventKind::Follow => "follow",
            EventKind::DirectMessage => "direct_message",
            EventKind::Insights => "insights",
        }
    }

    /// Discrete counter bumped on the matched post
    pub fn counter(&self) -> Option<MetricName> {
        match self {
            EventKind::Comment => Some(MetricName::Comments),
            EventKind::Reply => Some(MetricName::Replies),
            EventKind::Like => Some(MetricName::Likes),
            EventKind::Share => Some(MetricName::Shares),
            EventKind::Retweet => Some(MetricName::Retweets),
            _ => None,
        }
    }

    pub fn notification_type(&self) -> Option<NotificationType> {
        match self {
            EventKind::Comment => Some(NotificationType::Comment),
            EventKind::Reply => Some(NotificationType::Reply),
            EventKind::Like => Some(NotificationType::Like),
            EventKind::Share | EventKind::Retweet => Some(NotificationType::Share),
            EventKind::Mention => Some(NotificationType::Mention),
            EventKind::Follow => Some(NotificationType::Follow),
            EventKind::DirectMessage => Some(NotificationType::Dm),
            EventKind::Insights => None,
        }
    }

    /// Kinds that only make sense against a post published through us
    pub fn requires_post(&self) -> bool {
        self.counter().is_some() || *self == EventKind::Insights
    }
}

/// Provider-independent view of one webhook event
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub platform: Platform,
    pub kind: EventKind,
    /// Platform-side id of the post, media or tweet the event is about
    pub object_id: Option<String>,
    /// Platform-side id of the connected account that received the event
    pub account_ref: Option<String>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub text: Option<String>,
    /// Provider event id, when the provider supplies one
    pub event_id: Option<String>,
    pub insights: AnalyticsSnapshot,
    /// The provider's JSON for this single event
    pub raw: Value,
}

impl NormalizedEvent {
    fn new(platform: Platform, kind: EventKind, raw: &Value) -> Self {
        Self {
            platform,
            kind,
            object_id: None,
            account_ref: None,
            actor_id: None,
            actor_name: None,
            text: None,
            event_id: None,
            insights: AnalyticsSnapshot::default(),
            raw: raw.clone(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Idempotency key: the provider event id, else a digest of the raw event.
    ///
    /// Keys longer than `MAX_EVENT_KEY_LEN` are replaced by their digest.
    pub fn event_key(&self) -> String {
        match &self.event_id {
            Some(id) => {
                let key = format!("{}:{}", self.kind.as_str(), id);
                if key.len() <= MAX_EVENT_KEY_LEN {
                    key
                } else {
                    hex::encode(Sha256::digest(key.as_bytes()))
                }
            }
            None => {
                let bytes = serde_json::to_vec(&self.raw).unwrap_or_default();
                hex::encode(Sha256::digest(&bytes))
            }
        }
    }
}

/// String at `pointer`, numbers included
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_at(value: &Value, key: &str) -> Option<i64> {
    value
        .get(key)
        .or_else(|| value.pointer(&format!("/metrics/{}", key)))
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
}

fn snapshot_from(value: &Value) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        impressions: count_at(value, "impressions"),
        reach: count_at(value, "reach"),
        video_views: count_at(value, "video_views"),
        likes: count_at(value, "likes"),
        comments: count_at(value, "comments"),
        shares: count_at(value, "shares"),
    }
}

/// Decodes a verified delivery; unknown shapes yield no events
pub fn decode(platform: Platform, payload: &Value) -> Vec<NormalizedEvent> {
    match platform {
        Platform::Facebook => decode_graph(platform, payload, facebook_change),
        Platform::Instagram => decode_graph(platform, payload, instagram_change),
        Platform::Twitter => decode_twitter(payload),
        Platform::LinkedIn => decode_linkedin(payload),
    }
}

/// Short label stored with the audit record
pub fn delivery_event_type(platform: Platform, payload: &Value) -> String {
    let label = match platform {
        Platform::Facebook | Platform::Instagram => text_at(payload, "/entry/0/changes/0/field")
            .or_else(|| text_at(payload, "/object")),
        Platform::Twitter => payload.as_object().and_then(|map| {
            map.keys()
                .find(|key| key.ends_with("_events"))
                .cloned()
        }),
        Platform::LinkedIn => linkedin_items(payload)
            .first()
            .and_then(|item| text_at(item, "/type")),
    };
    label
        .unwrap_or_else(|| "unknown".to_string())
        .chars()
        .take(64)
        .collect()
}

// =============================================================================
// Facebook / Instagram (Graph API change notifications)
// =============================================================================

#[derive(Debug, Deserialize)]
struct GraphDelivery {
    #[serde(default)]
    entry: Vec<GraphEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphEntry {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    changes: Vec<GraphChange>,
}

#[derive(Debug, Deserialize)]
struct GraphChange {
    field: String,
    #[serde(default)]
    value: Value,
}

fn decode_graph(
    platform: Platform,
    payload: &Value,
    decode_change: fn(&str, &Value) -> Option<NormalizedEvent>,
) -> Vec<NormalizedEvent> {
    let Ok(delivery) = GraphDelivery::deserialize(payload) else {
        return Vec::new();
    };

    let mut events = Vec::new();
    for entry in delivery.entry {
        let account_ref = match &entry.id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };
        for change in entry.changes {
            if let Some(mut event) = decode_change(&change.field, &change.value) {
                event.platform = platform;
                event.account_ref = account_ref.clone();
                events.push(event);
            }
        }
    }
    events
}

fn facebook_change(field: &str, value: &Value) -> Option<NormalizedEvent> {
    let item = text_at(value, "/item");
    let verb = text_at(value, "/verb");
    if matches!(verb.as_deref(), Some("remove") | Some("hide") | Some("edited")) {
        return None;
    }

    let kind = match (field, item.as_deref()) {
        ("feed", Some("comment")) => EventKind::Comment,
        ("feed", Some("reaction")) | ("feed", Some("like")) => EventKind::Like,
        ("feed", Some("share")) => EventKind::Share,
        ("reactions", _) | ("likes", _) => EventKind::Like,
        ("comments", _) => EventKind::Comment,
        ("mention", _) | ("mentions", _) => EventKind::Mention,
        ("insights", _) | (_, Some("insights")) => EventKind::Insights,
        _ => return None,
    };

    let mut event = NormalizedEvent::new(Platform::Facebook, kind, value);
    event.object_id = text_at(value, "/post_id").or_else(|| text_at(value, "/parent_id"));
    event.actor_id = text_at(value, "/from/id");
    event.actor_name = text_at(value, "/from/name");
    event.text = text_at(value, "/message");
    event.event_id = match kind {
        EventKind::Comment => text_at(value, "/comment_id"),
        EventKind::Share => text_at(value, "/share_id"),
        _ => None,
    };
    if kind == EventKind::Insights {
        event.insights = snapshot_from(value);
    }
    Some(event)
}

fn instagram_change(field: &str, value: &Value) -> Option<NormalizedEvent> {
    let mut event = match field {
        "comments" => {
            let mut event = NormalizedEvent::new(Platform::Instagram, EventKind::Comment, value);
            event.object_id = text_at(value, "/media/id").or_else(|| text_at(value, "/media_id"));
            event.event_id = text_at(value, "/id");
            event.text = text_at(value, "/text");
            event
        }
        "mentions" => {
            let mut event = NormalizedEvent::new(Platform::Instagram, EventKind::Mention, value);
            event.object_id = text_at(value, "/media_id");
            event.event_id = text_at(value, "/comment_id").or_else(|| text_at(value, "/media_id"));
            event
        }
        "story_insights" => {
            let mut event = NormalizedEvent::new(Platform::Instagram, EventKind::Insights, value);
            event.object_id = text_at(value, "/media_id");
            event.insights = snapshot_from(value);
            event
        }
        _ => return None,
    };
    event.actor_id = text_at(value, "/from/id");
    event.actor_name = text_at(value, "/from/username");
    Some(event)
}

// =============================================================================
// Twitter (Account Activity API)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct TwitterDelivery {
    for_user_id: Option<String>,
    #[serde(default)]
    tweet_create_events: Vec<Value>,
    #[serde(default)]
    favorite_events: Vec<Value>,
    #[serde(default)]
    follow_events: Vec<Value>,
    #[serde(default)]
    direct_message_events: Vec<Value>,
    #[serde(default)]
    users: HashMap<String, Value>,
}

fn decode_twitter(payload: &Value) -> Vec<NormalizedEvent> {
    let Ok(delivery) = TwitterDelivery::deserialize(payload) else {
        return Vec::new();
    };
    let owner = delivery.for_user_id.clone();
    let is_owner = |id: &Option<String>| id.is_some() && *id == owner;

    let mut events = Vec::new();

    for tweet in &delivery.tweet_create_events {
        let author = text_at(tweet, "/user/id_str");
        if is_owner(&author) {
            continue;
        }

        let (kind, object_id) = if let Some(original) = text_at(tweet, "/retweeted_status/id_str") {
            (EventKind::Retweet, Some(original))
        } else if let Some(parent) = text_at(tweet, "/in_reply_to_status_id_str") {
            (EventKind::Reply, Some(parent))
        } else if mentions_user(tweet, owner.as_deref()) {
            (EventKind::Mention, text_at(tweet, "/id_str"))
        } else {
            continue;
        };

        let mut event = NormalizedEvent::new(Platform::Twitter, kind, tweet);
        event.object_id = object_id;
        event.actor_id = author;
        event.actor_name = text_at(tweet, "/user/screen_name");
        event.text = text_at(tweet, "/text");
        event.event_id = text_at(tweet, "/id_str");
        events.push(event);
    }

    for favorite in &delivery.favorite_events {
        let actor = text_at(favorite, "/user/id_str");
        if is_owner(&actor) {
            continue;
        }
        let mut event = NormalizedEvent::new(Platform::Twitter, EventKind::Like, favorite);
        event.object_id = text_at(favorite, "/favorited_status/id_str");
        event.actor_id = actor;
        event.actor_name = text_at(favorite, "/user/screen_name");
        event.event_id = text_at(favorite, "/id");
        events.push(event);
    }

    for follow in &delivery.follow_events {
        if text_at(follow, "/type").as_deref() != Some("follow") {
            continue;
        }
        let target = text_at(follow, "/target/id");
        if owner.is_some() && target.is_some() && target != owner {
            continue;
        }
        let mut event = NormalizedEvent::new(Platform::Twitter, EventKind::Follow, follow);
        event.actor_id = text_at(follow, "/source/id");
        event.actor_name = text_at(follow, "/source/screen_name");
        event.event_id = match (&event.actor_id, text_at(follow, "/created_timestamp")) {
            (Some(actor), Some(ts)) => Some(format!("{}:{}", actor, ts)),
            _ => None,
        };
        events.push(event);
    }

    for message in &delivery.direct_message_events {
        if text_at(message, "/type").as_deref() != Some("message_create") {
            continue;
        }
        let sender = text_at(message, "/message_create/sender_id");
        if is_owner(&sender) {
            continue;
        }
        let mut event = NormalizedEvent::new(Platform::Twitter, EventKind::DirectMessage, message);
        event.actor_name = sender
            .as_ref()
            .and_then(|id| delivery.users.get(id))
            .and_then(|user| text_at(user, "/screen_name"));
        event.actor_id = sender;
        event.text = text_at(message, "/message_create/message_data/text");
        event.event_id = text_at(message, "/id");
        events.push(event);
    }

    for event in &mut events {
        event.account_ref = owner.clone();
    }
    events
}

fn mentions_user(tweet: &Value, user_id: Option<&str>) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    tweet
        .pointer("/entities/user_mentions")
        .and_then(Value::as_array)
        .is_some_and(|mentions| {
            mentions
                .iter()
                .any(|m| text_at(m, "/id_str").as_deref() == Some(user_id))
        })
}

// =============================================================================
// LinkedIn (social action notifications)
// =============================================================================

fn linkedin_items(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("events").and_then(Value::as_array) {
            Some(items) => items.clone(),
            None => vec![payload.clone()],
        },
        _ => Vec::new(),
    }
}

fn decode_linkedin(payload: &Value) -> Vec<NormalizedEvent> {
    linkedin_items(payload)
        .iter()
        .filter_map(linkedin_event)
        .collect()
}

fn linkedin_event(item: &Value) -> Option<NormalizedEvent> {
    let event_type = text_at(item, "/type")?;
    let action = text_at(item, "/action").unwrap_or_default();

    let kind = match event_type.as_str() {
        "ORGANIZATION_SOCIAL_ACTION"
        | "ORGANIZATION_SOCIAL_ACTION_NOTIFICATIONS"
        | "MEMBER_SOCIAL_ACTION" => match action.as_str() {
            "LIKE" | "REACTION" => EventKind::Like,
            "COMMENT" => EventKind::Comment,
            "SHARE" | "RESHARE" => EventKind::Share,
            "MENTION" | "SHARE_MENTION" | "COMMENT_MENTION" => EventKind::Mention,
            _ => return None,
        },
        "COMMENT" => EventKind::Comment,
        "SHARE" => EventKind::Share,
        _ => return None,
    };

    let mut event = NormalizedEvent::new(Platform::LinkedIn, kind, item);
    event.object_id = text_at(item, "/sourcePost")
        .or_else(|| text_at(item, "/object"))
        .or_else(|| text_at(item, "/post"));
    event.account_ref = text_at(item, "/organizationalEntity")
        .or_else(|| text_at(item, "/owner"))
        .map(|urn| urn.rsplit(':').next().unwrap_or(urn.as_str()).to_string());
    event.actor_id = text_at(item, "/actor");
    event.text = text_at(item, "/comment/text").or_else(|| text_at(item, "/text"));
    event.event_id = text_at(item, "/notificationId").or_else(|| text_at(item, "/id"));
    Some(event)
}
