//! # Slack Handler
//!
//! POSTs a structured message to the setting's incoming-webhook URL: one
//! attachment per event with a per-kind color and emoji title, standard
//! block fields, and extra fields for transaction and log events. Slack
//! incoming webhooks answer `200` with the literal body `ok` on success;
//! anything else counts as a failure.

use crate::domain::{DeliveryResult, Notification, NotificationSetting, SettingType};
use crate::error::NotifyError;
use crate::handlers::NotificationHandler;
use crate::rate_limit::MinuteBucket;
use async_trait::async_trait;
use serde::Serialize;
use shared_bus::EventKind;
use std::time::{Duration, Instant};
use tracing::debug;

/// Slack handler configuration.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Channel used when the setting has none.
    pub default_channel: String,
    /// Username used when the setting has none.
    pub default_username: String,
    /// Icon emoji used when the setting has none.
    pub default_icon: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Deliveries allowed per minute.
    pub rate_limit_per_minute: u32,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            default_channel: "#chain-events".to_string(),
            default_username: "ChainSentry".to_string(),
            default_icon: ":bell:".to_string(),
            timeout: Duration::from_secs(10),
            rate_limit_per_minute: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    channel: String,
    username: String,
    icon_emoji: String,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: String,
    title: String,
    fields: Vec<SlackField>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

fn event_color(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Block => "#36a64f",
        EventKind::Transaction => "#3aa3e3",
        EventKind::Log => "#f2c744",
        EventKind::ConsensusBlock => "#764fa5",
        EventKind::ConsensusError => "#d00000",
        EventKind::ValidatorSet => "#e8912d",
    }
}

fn event_title(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Block => ":package: New Block",
        EventKind::Transaction => ":arrows_counterclockwise: Transaction",
        EventKind::Log => ":memo: Contract Log",
        EventKind::ConsensusBlock => ":ballot_box_with_check: Consensus Block",
        EventKind::ConsensusError => ":rotating_light: Consensus Anomaly",
        EventKind::ValidatorSet => ":busts_in_silhouette: Validator Set Change",
    }
}

fn payload_str(payload: &serde_json::Value, key: &str) -> String {
    match &payload[key] {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Slack incoming-webhook delivery.
pub struct SlackHandler {
    client: reqwest::Client,
    config: SlackConfig,
    limiter: MinuteBucket,
}

impl SlackHandler {
    /// Build the handler; fails only on TLS backend initialization.
    pub fn new(config: SlackConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;
        let limiter = MinuteBucket::new(config.rate_limit_per_minute);
        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    fn build_message(
        &self,
        notification: &Notification,
        setting: &NotificationSetting,
    ) -> SlackMessage {
        let payload = &notification.payload;
        let kind = notification.event_type;

        let block_number = match kind {
            EventKind::Block | EventKind::ConsensusBlock | EventKind::ConsensusError => {
                payload_str(payload, "number")
            }
            _ => payload_str(payload, "block_number"),
        };

        let mut fields = vec![
            SlackField {
                title: "Block Number".to_string(),
                value: block_number,
                short: true,
            },
            SlackField {
                title: "Timestamp".to_string(),
                value: notification.created_at.to_rfc3339(),
                short: true,
            },
            SlackField {
                title: "Block Hash".to_string(),
                value: match kind {
                    EventKind::Block => payload_str(payload, "hash"),
                    _ => payload_str(payload, "block_hash"),
                },
                short: false,
            },
        ];

        if kind == EventKind::Transaction {
            fields.push(SlackField {
                title: "From".to_string(),
                value: payload_str(payload, "from"),
                short: true,
            });
            fields.push(SlackField {
                title: "To".to_string(),
                value: payload_str(payload, "to"),
                short: true,
            });
            let value = payload_str(payload, "value");
            if !value.is_empty() && value != "0" && value != "0x0" {
                fields.push(SlackField {
                    title: "Value".to_string(),
                    value,
                    short: true,
                });
            }
        }

        if kind == EventKind::Log {
            fields.push(SlackField {
                title: "Contract".to_string(),
                value: payload_str(payload, "address"),
                short: false,
            });
        }

        SlackMessage {
            channel: setting
                .slack_channel
                .clone()
                .unwrap_or_else(|| self.config.default_channel.clone()),
            username: setting
                .slack_username
                .clone()
                .unwrap_or_else(|| self.config.default_username.clone()),
            icon_emoji: setting
                .slack_icon_emoji
                .clone()
                .unwrap_or_else(|| self.config.default_icon.clone()),
            attachments: vec![SlackAttachment {
                color: event_color(kind).to_string(),
                title: event_title(kind).to_string(),
                fields,
            }],
        }
    }
}

#[async_trait]
impl NotificationHandler for SlackHandler {
    fn kind(&self) -> SettingType {
        SettingType::Slack
    }

    fn validate(&self, setting: &NotificationSetting) -> Result<(), NotifyError> {
        let url = setting
            .slack_webhook_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| NotifyError::InvalidSetting("slack_webhook_url is required".into()))?;

        let parsed = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::InvalidSetting(format!("invalid slack_webhook_url: {e}")))?;
        if parsed.scheme() != "https" {
            return Err(NotifyError::InvalidSetting(
                "slack_webhook_url must be https".into(),
            ));
        }
        Ok(())
    }

    async fn deliver(
        &self,
        notification: &Notification,
        setting: &NotificationSetting,
    ) -> DeliveryResult {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        if !self.limiter.try_acquire() {
            return DeliveryResult::failure("rate limit exceeded", elapsed_ms(start));
        }

        let Some(url) = setting.slack_webhook_url.as_deref() else {
            return DeliveryResult::failure("slack_webhook_url missing", elapsed_ms(start));
        };

        let message = self.build_message(notification, setting);
        let response = match self.client.post(url).json(&message).send().await {
            Ok(response) => response,
            Err(err) => return DeliveryResult::failure(err.to_string(), elapsed_ms(start)),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let success = status.as_u16() == 200 && body == "ok";

        debug!(
            notification = %notification.id,
            status = status.as_u16(),
            "Slack delivered"
        );

        DeliveryResult {
            success,
            status_code: Some(status.as_u16()),
            response: Some(body.clone()),
            error: if success {
                None
            } else {
                Some(format!("HTTP {status}: {body}"))
            },
            duration_ms: elapsed_ms(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::U256;
    use shared_bus::{ChainEvent, TransactionPayload};
    use shared_types::{Address, Hash};

    fn setting() -> NotificationSetting {
        let mut setting =
            NotificationSetting::new("s1", SettingType::Slack, vec![EventKind::Transaction]);
        setting.slack_webhook_url = Some("https://hooks.slack.com/services/T/B/x".into());
        setting
    }

    fn tx_notification(value: U256) -> Notification {
        let event = ChainEvent::Transaction(TransactionPayload {
            tx_hash: Hash::repeat_byte(0x11),
            block_number: 42,
            block_hash: Hash::repeat_byte(0x22),
            from: Address::repeat_byte(0x01),
            to: Some(Address::repeat_byte(0x02)),
            value,
            status: Some(true),
            contract_address: None,
        });
        Notification::new(&setting(), EventKind::Transaction, event.payload_json())
    }

    #[test]
    fn test_validate_url() {
        let handler = SlackHandler::new(SlackConfig::default()).unwrap();
        assert!(handler.validate(&setting()).is_ok());

        let mut bad = setting();
        bad.slack_webhook_url = Some("http://hooks.slack.com/insecure".into());
        assert!(handler.validate(&bad).is_err());

        bad.slack_webhook_url = None;
        assert!(handler.validate(&bad).is_err());
    }

    #[test]
    fn test_transaction_fields() {
        let handler = SlackHandler::new(SlackConfig::default()).unwrap();
        let message = handler.build_message(&tx_notification(U256::from(5u64)), &setting());

        assert_eq!(message.attachments.len(), 1);
        let attachment = &message.attachments[0];
        assert_eq!(attachment.color, "#3aa3e3");

        let titles: Vec<&str> = attachment.fields.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Block Number"));
        assert!(titles.contains(&"From"));
        assert!(titles.contains(&"To"));
        assert!(titles.contains(&"Value"));

        let block_field = &attachment.fields[0];
        assert_eq!(block_field.value, "42");
    }

    #[test]
    fn test_zero_value_field_omitted() {
        let handler = SlackHandler::new(SlackConfig::default()).unwrap();
        let message = handler.build_message(&tx_notification(U256::zero()), &setting());

        let titles: Vec<&str> = message.attachments[0]
            .fields
            .iter()
            .map(|f| f.title.as_str())
            .collect();
        assert!(!titles.contains(&"Value"));
    }

    #[test]
    fn test_defaults_applied() {
        let handler = SlackHandler::new(SlackConfig::default()).unwrap();
        let message = handler.build_message(&tx_notification(U256::one()), &setting());
        assert_eq!(message.channel, "#chain-events");
        assert_eq!(message.username, "ChainSentry");
        assert_eq!(message.icon_emoji, ":bell:");

        let mut custom = setting();
        custom.slack_channel = Some("#alerts".into());
        let message = handler.build_message(&tx_notification(U256::one()), &custom);
        assert_eq!(message.channel, "#alerts");
    }
}
