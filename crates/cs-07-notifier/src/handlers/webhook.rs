//! # Webhook Handler
//!
//! POSTs the event as JSON. When the setting carries a secret, the exact
//! serialized body is signed with HMAC-SHA256 and the hex digest travels
//! in the configured signature header as `sha256=<hex>`. Success is any
//! 2xx status; response bodies are kept up to a fixed cap for the
//! delivery history.

use crate::domain::{DeliveryResult, Notification, NotificationSetting, SettingType};
use crate::error::NotifyError;
use crate::handlers::NotificationHandler;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, Instant};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Response bytes kept for the delivery history.
pub const MAX_RESPONSE_BYTES: usize = 10 * 1024;

/// HMAC-SHA256 of `payload` keyed by `secret`, hex-encoded.
#[must_use]
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature, with or without the `sha256=` prefix.
#[must_use]
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let hex_part = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(provided) = hex::decode(hex_part) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

/// Webhook handler configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Header carrying the `sha256=<hex>` signature.
    pub signature_header: String,
    /// When non-empty, target hosts must match an entry exactly
    /// (case-insensitive) or be a subdomain of one.
    pub allowed_hosts: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            user_agent: "chainsentry-webhook/0.1".to_string(),
            signature_header: "X-Webhook-Signature".to_string(),
            allowed_hosts: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP webhook delivery.
pub struct WebhookHandler {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookHandler {
    /// Build the handler; fails only on TLS backend initialization.
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn host_allowed(&self, host: &str) -> bool {
        if self.config.allowed_hosts.is_empty() {
            return true;
        }
        let host = host.to_ascii_lowercase();
        self.config.allowed_hosts.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            host == allowed || host.ends_with(&format!(".{allowed}"))
        })
    }
}

#[async_trait]
impl NotificationHandler for WebhookHandler {
    fn kind(&self) -> SettingType {
        SettingType::Webhook
    }

    fn validate(&self, setting: &NotificationSetting) -> Result<(), NotifyError> {
        let url = setting
            .webhook_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| NotifyError::InvalidSetting("webhook_url is required".into()))?;

        let parsed = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::InvalidSetting(format!("invalid webhook_url: {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(NotifyError::InvalidSetting(format!(
                    "unsupported scheme {other}"
                )))
            }
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| NotifyError::InvalidSetting("webhook_url has no host".into()))?;
        if !self.host_allowed(host) {
            return Err(NotifyError::InvalidSetting(format!(
                "host {host} not in allow-list"
            )));
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

        let Some(url) = setting.webhook_url.as_deref() else {
            return DeliveryResult::failure("webhook_url missing", elapsed_ms(start));
        };

        let body = serde_json::json!({
            "id": notification.id,
            "event_type": notification.event_type.as_str(),
            "timestamp": notification.created_at.to_rfc3339(),
            "data": notification.payload,
        });
        let raw = match serde_json::to_vec(&body) {
            Ok(raw) => raw,
            Err(err) => return DeliveryResult::failure(err.to_string(), elapsed_ms(start)),
        };

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.config.user_agent)
            .header("X-Webhook-ID", &notification.id)
            .header("X-Event-Type", notification.event_type.as_str());

        for (name, value) in &setting.webhook_headers {
            request = request.header(name, value);
        }

        if let Some(secret) = setting.webhook_secret.as_deref() {
            if !secret.is_empty() {
                let signature = format!("sha256={}", sign_payload(&raw, secret));
                request = request.header(&self.config.signature_header, signature);
            }
        }

        let response = match request.body(raw).send().await {
            Ok(response) => response,
            Err(err) => return DeliveryResult::failure(err.to_string(), elapsed_ms(start)),
        };

        let status = response.status();
        let mut text = response.text().await.unwrap_or_default();
        text.truncate(MAX_RESPONSE_BYTES);

        debug!(
            notification = %notification.id,
            status = status.as_u16(),
            "Webhook delivered"
        );

        DeliveryResult {
            success: status.is_success(),
            status_code: Some(status.as_u16()),
            response: Some(text),
            error: if status.is_success() {
                None
            } else {
                Some(format!("HTTP {status}"))
            },
            duration_ms: elapsed_ms(start),
        }
    }
}
