//! # Resume Domain Types
//!
//! Sessions, cached events, and the outbound wire envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Bound to a live connection.
    Active,
    /// Connection lost; replayable until the TTL elapses.
    Disconnected,
    /// TTL elapsed; eligible for deletion.
    Expired,
}

impl SessionState {
    /// Stable string form used in index keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disconnected => "disconnected",
            Self::Expired => "expired",
        }
    }
}

/// Per-topic subscription state within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSubscription {
    /// Last event id acknowledged on this topic.
    #[serde(default)]
    pub last_event_id: Option<String>,
    /// Whether the subscription is live.
    pub active: bool,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

/// A persisted delivery session.
///
/// At most one unexpired session exists per client id; reconnecting with
/// a known client id reactivates the existing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session id.
    pub id: String,
    /// Owning client id.
    pub client_id: String,
    /// Lifecycle state.
    pub state: SessionState,
    /// Topic subscriptions.
    #[serde(default)]
    pub subscriptions: HashMap<String, TopicSubscription>,
    /// Last event id delivered or cached for this session.
    #[serde(default)]
    pub last_event_id: Option<String>,
    /// Last activity time; drives TTL expiry.
    pub last_seen: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time-to-live measured from `last_seen`.
    #[serde(with = "duration_millis")]
    pub ttl: Duration,
}

impl Session {
    /// A fresh active session for `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            client_id: client_id.into(),
            state: SessionState::Active,
            subscriptions: HashMap::new(),
            last_event_id: None,
            last_seen: now,
            created_at: now,
            ttl,
        }
    }

    /// True when `last_seen + ttl` is in the past.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        self.last_seen + ttl < now
    }

    /// Advance `last_seen`; never moves backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}

/// A replayable copy of one outbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEvent {
    /// Event id.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Event type forwarded to the client.
    pub event_type: String,
    /// Event payload.
    pub payload: serde_json::Value,
    /// Cache insertion time; replay order.
    pub timestamp: DateTime<Utc>,
    /// Whether a live send succeeded. Best-effort.
    pub delivered: bool,
}

impl CachedEvent {
    /// A fresh undelivered cache row.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            session_id: session_id.into(),
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
            delivered: false,
        }
    }
}

/// Delivery metadata attached to live and replayed messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// The cached event's id.
    pub event_id: String,
    /// True for replayed (vs live) messages.
    pub replay: bool,
}

/// The outbound wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message type: the event type, `replay_start`, or `replay_end`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Delivery metadata; absent on replay brackets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MessageMeta>,
}

impl OutboundMessage {
    /// A live or replayed event message.
    #[must_use]
    pub fn event(event: &CachedEvent, replay: bool) -> Self {
        Self {
            kind: event.event_type.clone(),
            payload: event.payload.clone(),
            meta: Some(MessageMeta {
                event_id: event.id.clone(),
                replay,
            }),
        }
    }

    /// The `replay_start {count}` bracket.
    #[must_use]
    pub fn replay_start(count: usize) -> Self {
        Self {
            kind: "replay_start".to_string(),
            payload: serde_json::json!({ "count": count }),
            meta: None,
        }
    }

    /// The `replay_end` bracket.
    #[must_use]
    pub fn replay_end() -> Self {
        Self {
            kind: "replay_end".to_string(),
            payload: serde_json::Value::Null,
            meta: None,
        }
    }
}

/// A client's reconnect handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectRequest {
    /// The session to resume.
    pub session_id: String,
    /// Last event id the client saw; `None` replays everything cached.
    #[serde(default)]
    pub last_event_id: Option<String>,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let mut session = Session::new("c1", Duration::from_secs(60));
        let now = Utc::now();
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + chrono::Duration::seconds(120)));

        session.touch(now + chrono::Duration::seconds(90));
        assert!(!session.is_expired(now + chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_touch_never_regresses() {
        let mut session = Session::new("c1", Duration::from_secs(60));
        let before = session.last_seen;
        session.touch(before - chrono::Duration::seconds(10));
        assert_eq!(session.last_seen, before);
    }

    #[test]
    fn test_outbound_shapes() {
        let event = CachedEvent::new("s1", "block", serde_json::json!({"number": 1}));

        let live = OutboundMessage::event(&event, false);
        assert_eq!(live.kind, "block");
        assert!(!live.meta.as_ref().unwrap().replay);

        let replayed = OutboundMessage::event(&event, true);
        assert!(replayed.meta.as_ref().unwrap().replay);

        let start = OutboundMessage::replay_start(2);
        assert_eq!(start.kind, "replay_start");
        assert_eq!(start.payload["count"], 2);
        assert!(start.meta.is_none());

        let json = serde_json::to_value(&OutboundMessage::replay_end()).unwrap();
        assert_eq!(json["type"], "replay_end");
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_event_ids_unique() {
        let a = CachedEvent::new("s1", "block", serde_json::Value::Null);
        let b = CachedEvent::new("s1", "block", serde_json::Value::Null);
        assert_ne!(a.id, b.id);
        assert!(!a.delivered);
    }
}
