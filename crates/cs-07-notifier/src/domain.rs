//! # Notification Domain Types
//!
//! Settings, notification rows, delivery results, history, and stats.

use chrono::{DateTime, Utc};
use cs_03_chain_index::TokenTransfer;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use shared_bus::{ChainEvent, EventKind};
use shared_types::{Address, Hash, Log};
use std::collections::HashMap;

/// The delivery channel of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    /// HTTP POST with optional HMAC signature.
    Webhook,
    /// SMTP email.
    Email,
    /// Slack incoming webhook.
    Slack,
}

impl SettingType {
    /// Stable string form used in keys and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Email => "email",
            Self::Slack => "slack",
        }
    }
}

/// Optional event filter attached to a setting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFilter {
    /// Match only these addresses (log emitter or tx endpoints).
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Match only logs carrying one of these topics.
    #[serde(default)]
    pub topics: Vec<Hash>,
    /// Match only token-transfer logs of these kinds (`erc20`, `erc721`).
    #[serde(default)]
    pub contract_types: Vec<String>,
    /// Match only transactions with at least this value.
    #[serde(default)]
    pub min_value: Option<U256>,
}

impl NotificationFilter {
    /// True when the event passes the filter.
    #[must_use]
    pub fn matches(&self, event: &ChainEvent) -> bool {
        if !self.addresses.is_empty() {
            let hit = match event {
                ChainEvent::Log(p) => self.addresses.contains(&p.address),
                ChainEvent::Transaction(p) => {
                    self.addresses.contains(&p.from)
                        || p.to.is_some_and(|to| self.addresses.contains(&to))
                }
                _ => true,
            };
            if !hit {
                return false;
            }
        }

        if !self.topics.is_empty() {
            if let ChainEvent::Log(p) = event {
                if !p.topics.iter().any(|t| self.topics.contains(t)) {
                    return false;
                }
            }
        }

        if !self.contract_types.is_empty() {
            if let ChainEvent::Log(p) = event {
                let log = Log {
                    address: p.address,
                    topics: p.topics.clone(),
                    data: p.data.clone(),
                    block_number: p.block_number,
                    tx_hash: p.tx_hash,
                    log_index: p.log_index,
                };
                let kind = match TokenTransfer::from_log(&log) {
                    Some(TokenTransfer::Erc20(_)) => "erc20",
                    Some(TokenTransfer::Erc721(_)) => "erc721",
                    None => return false,
                };
                if !self.contract_types.iter().any(|t| t == kind) {
                    return false;
                }
            }
        }

        if let Some(min_value) = self.min_value {
            if let ChainEvent::Transaction(p) = event {
                if p.value < min_value {
                    return false;
                }
            }
        }

        true
    }
}

/// A persisted notification setting.
///
/// `id` is immutable and `created_at` is preserved across updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSetting {
    /// Immutable identifier.
    pub id: String,
    /// Delivery channel.
    pub setting_type: SettingType,
    /// Disabled settings match no events.
    pub enabled: bool,
    /// Event kinds this setting subscribes to.
    pub event_types: Vec<EventKind>,
    /// Optional event filter.
    #[serde(default)]
    pub filter: Option<NotificationFilter>,

    // Webhook destination.
    /// Target URL.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// HMAC signing secret.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Extra request headers.
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,

    // Email destination.
    /// Primary recipients.
    #[serde(default)]
    pub email_to: Vec<String>,
    /// Carbon-copy recipients.
    #[serde(default)]
    pub email_cc: Vec<String>,
    /// Subject override.
    #[serde(default)]
    pub email_subject: Option<String>,

    // Slack destination.
    /// Incoming-webhook URL.
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    /// Channel override.
    #[serde(default)]
    pub slack_channel: Option<String>,
    /// Username override.
    #[serde(default)]
    pub slack_username: Option<String>,
    /// Icon-emoji override.
    #[serde(default)]
    pub slack_icon_emoji: Option<String>,

    /// Creation time, preserved on update.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl NotificationSetting {
    /// A minimal enabled setting of the given channel.
    #[must_use]
    pub fn new(id: impl Into<String>, setting_type: SettingType, event_types: Vec<EventKind>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            setting_type,
            enabled: true,
            event_types,
            filter: None,
            webhook_url: None,
            webhook_secret: None,
            webhook_headers: HashMap::new(),
            email_to: Vec::new(),
            email_cc: Vec::new(),
            email_subject: None,
            slack_webhook_url: None,
            slack_channel: None,
            slack_username: None,
            slack_icon_emoji: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the setting wants this event.
    #[must_use]
    pub fn wants(&self, event: &ChainEvent) -> bool {
        self.enabled
            && self.event_types.contains(&event.kind())
            && self.filter.as_ref().map_or(true, |f| f.matches(event))
    }
}

/// Notification lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Created, awaiting first dispatch.
    Pending,
    /// Dispatched at least once, may retry.
    Retrying,
    /// Delivered. Terminal.
    Sent,
    /// Retries exhausted. Terminal.
    Failed,
    /// Cancelled by an operator. Terminal.
    Cancelled,
}

impl NotificationStatus {
    /// Stable string form used in index keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// True for states a notification never leaves.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }
}

/// A persisted notification row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Time-ordered unique id.
    pub id: String,
    /// Owning setting.
    pub setting_id: String,
    /// Channel copied from the setting at creation.
    pub setting_type: SettingType,
    /// The triggering event kind.
    pub event_type: EventKind,
    /// The event payload delivered to the channel.
    pub payload: serde_json::Value,
    /// Lifecycle state.
    pub status: NotificationStatus,
    /// Completed delivery attempts that failed.
    pub retry_count: u32,
    /// When the next attempt is due, while retrying.
    #[serde(default)]
    pub next_retry: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Delivery time, once sent.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    /// Last delivery error.
    #[serde(default)]
    pub error: Option<String>,
}

impl Notification {
    /// A fresh pending notification for `setting` carrying `payload`.
    #[must_use]
    pub fn new(setting: &NotificationSetting, event_type: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            setting_id: setting.id.clone(),
            setting_type: setting.setting_type,
            event_type,
            payload,
            status: NotificationStatus::Pending,
            retry_count: 0,
            next_retry: None,
            created_at: Utc::now(),
            sent_at: None,
            error: None,
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// True when the channel accepted the notification.
    pub success: bool,
    /// HTTP status, where applicable.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Response body excerpt, where applicable.
    #[serde(default)]
    pub response: Option<String>,
    /// Failure description.
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock duration of the attempt.
    pub duration_ms: u64,
}

impl DeliveryResult {
    /// A failed result with the given error text.
    #[must_use]
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration_ms,
            ..Self::default()
        }
    }
}

/// One delivery-history row. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryHistory {
    /// The attempted notification.
    pub notification_id: String,
    /// Its owning setting.
    pub setting_id: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// The attempt's outcome.
    pub result: DeliveryResult,
    /// When the attempt completed.
    pub timestamp: DateTime<Utc>,
}

/// Per-setting delivery statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingStats {
    /// The owning setting.
    pub setting_id: String,
    /// Notifications delivered.
    pub total_sent: u64,
    /// Notifications that exhausted retries.
    pub total_failed: u64,
    /// Last successful delivery.
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
    /// Last terminal failure.
    #[serde(default)]
    pub last_failed_at: Option<DateTime<Utc>>,
    /// Rolling average delivery duration.
    pub avg_delivery_ms: f64,
    /// sent / (sent + failed).
    pub success_rate: f64,
}

impl SettingStats {
    /// Fold a successful delivery into the stats.
    pub fn record_success(&mut self, duration_ms: u64, now: DateTime<Utc>) {
        self.total_sent += 1;
        self.last_sent_at = Some(now);
        let n = self.total_sent as f64;
        self.avg_delivery_ms += (duration_ms as f64 - self.avg_delivery_ms) / n;
        self.recompute_rate();
    }

    /// Fold a terminal failure into the stats.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.total_failed += 1;
        self.last_failed_at = Some(now);
        self.recompute_rate();
    }

    fn recompute_rate(&mut self) {
        let total = self.total_sent + self.total_failed;
        self.success_rate = if total == 0 {
            0.0
        } else {
            self.total_sent as f64 / total as f64
        };
    }
}
