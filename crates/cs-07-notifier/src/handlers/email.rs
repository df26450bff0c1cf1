//! # Email Handler
//!
//! Renders a subject and HTML body (per-event template or built-in
//! fallback) and hands a [`EmailMessage`] to the [`SmtpSender`] seam.
//! Production wires [`LettreSender`]; tests substitute a recording fake.
//! Deliveries share a minute token-bucket; an empty bucket fails the
//! attempt without dialing SMTP.

use crate::domain::{DeliveryResult, Notification, NotificationSetting, SettingType};
use crate::error::NotifyError;
use crate::handlers::NotificationHandler;
use crate::rate_limit::MinuteBucket;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use shared_bus::EventKind;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// From-name used when the config provides no sender.
const DEFAULT_FROM: &str = "Indexer <indexer@localhost>";

/// A rendered outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Sender mailbox.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

/// The SMTP seam: one blocking send per message.
pub trait SmtpSender: Send + Sync {
    /// Deliver one message; the error string lands in the delivery result.
    fn send(&self, message: &EmailMessage) -> Result<(), String>;
}

/// Email handler configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server host.
    pub smtp_host: String,
    /// SMTP server port.
    pub smtp_port: u16,
    /// PLAIN auth username; auth is skipped when absent.
    pub username: Option<String>,
    /// PLAIN auth password.
    pub password: Option<String>,
    /// Sender mailbox; defaults to "Indexer".
    pub from: Option<String>,
    /// Dial TLS (minimum 1.2, SNI = `smtp_host`).
    pub use_tls: bool,
    /// Maximum To + Cc recipients per message.
    pub max_recipients: usize,
    /// Deliveries allowed per minute.
    pub rate_limit_per_minute: u32,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            from: None,
            use_tls: true,
            max_recipients: 10,
            rate_limit_per_minute: 30,
        }
    }
}

/// Production SMTP sender over lettre.
pub struct LettreSender {
    config: EmailConfig,
}

impl LettreSender {
    /// Build from the handler configuration.
    #[must_use]
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<SmtpTransport, String> {
        let mut builder = if self.config.use_tls {
            SmtpTransport::relay(&self.config.smtp_host).map_err(|e| e.to_string())?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        };
        builder = builder.port(self.config.smtp_port);

        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(builder.build())
    }
}

impl SmtpSender for LettreSender {
    fn send(&self, message: &EmailMessage) -> Result<(), String> {
        let from: Mailbox = message.from.parse().map_err(|e| format!("from: {e}"))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML);

        for to in &message.to {
            builder = builder.to(to.parse().map_err(|e| format!("to: {e}"))?);
        }
        for cc in &message.cc {
            builder = builder.cc(cc.parse().map_err(|e| format!("cc: {e}"))?);
        }

        let email = builder
            .body(message.html_body.clone())
            .map_err(|e| e.to_string())?;

        let transport = self.build_transport()?;
        transport.send(&email).map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// SMTP email delivery.
pub struct EmailHandler {
    config: EmailConfig,
    transport: Arc<dyn SmtpSender>,
    templates: HashMap<EventKind, String>,
    limiter: MinuteBucket,
}

impl EmailHandler {
    /// Build with the production lettre transport.
    #[must_use]
    pub fn new(config: EmailConfig) -> Self {
        let transport = Arc::new(LettreSender::new(config.clone()));
        Self::with_transport(config, transport)
    }

    /// Build with an explicit transport (tests use a recording fake).
    #[must_use]
    pub fn with_transport(config: EmailConfig, transport: Arc<dyn SmtpSender>) -> Self {
        let limiter = MinuteBucket::new(config.rate_limit_per_minute);
        Self {
            config,
            transport,
            templates: HashMap::new(),
            limiter,
        }
    }

    /// Register a body template for one event kind.
    ///
    /// Templates may reference `{{event_type}}` and `{{payload}}`.
    pub fn set_template(&mut self, kind: EventKind, template: impl Into<String>) {
        self.templates.insert(kind, template.into());
    }

    fn default_subject(kind: EventKind) -> &'static str {
        match kind {
            EventKind::Block => "New block indexed",
            EventKind::Transaction => "Transaction observed",
            EventKind::Log => "Contract log observed",
            EventKind::ConsensusBlock => "Consensus summary",
            EventKind::ConsensusError => "Consensus anomaly detected",
            EventKind::ValidatorSet => "Validator set changed",
        }
    }

    fn render_body(&self, notification: &Notification) -> String {
        let payload = serde_json::to_string_pretty(&notification.payload)
            .unwrap_or_else(|_| "{}".to_string());

        match self.templates.get(&notification.event_type) {
            Some(template) => template
                .replace("{{event_type}}", notification.event_type.as_str())
                .replace("{{payload}}", &payload),
            None => format!(
                "<html><body><h2>{}</h2><pre>{}</pre></body></html>",
                Self::default_subject(notification.event_type),
                payload
            ),
        }
    }

    fn validate_address(address: &str) -> Result<(), NotifyError> {
        let invalid = || NotifyError::InvalidSetting(format!("invalid email address {address:?}"));

        let (local, domain) = address.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.is_empty() {
            return Err(invalid());
        }
        let (name, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
        if name.is_empty() || tld.is_empty() {
            return Err(invalid());
        }
        Ok(())
    }

    fn build_message(
        &self,
        notification: &Notification,
        setting: &NotificationSetting,
    ) -> EmailMessage {
        let subject = setting
            .email_subject
            .clone()
            .unwrap_or_else(|| Self::default_subject(notification.event_type).to_string());

        EmailMessage {
            from: self
                .config
                .from
                .clone()
                .unwrap_or_else(|| DEFAULT_FROM.to_string()),
            to: setting.email_to.clone(),
            cc: setting.email_cc.clone(),
            subject,
            html_body: self.render_body(notification),
        }
    }
}

#[async_trait]
impl NotificationHandler for EmailHandler {
    fn kind(&self) -> SettingType {
        SettingType::Email
    }

    fn validate(&self, setting: &NotificationSetting) -> Result<(), NotifyError> {
        if setting.email_to.is_empty() {
            return Err(NotifyError::InvalidSetting(
                "at least one recipient is required".into(),
            ));
        }
        let total = setting.email_to.len() + setting.email_cc.len();
        if total > self.config.max_recipients {
            return Err(NotifyError::InvalidSetting(format!(
                "{total} recipients exceed the limit of {}",
                self.config.max_recipients
            )));
        }
        for address in setting.email_to.iter().chain(setting.email_cc.iter()) {
            Self::validate_address(address)?;
        }
        Ok(())
    }

    async fn deliver(
        &self,
        notification: &Notification,
        setting: &NotificationSetting,
    ) -> DeliveryResult {
        let start = Instant::now();

        if !self.limiter.try_acquire() {
            return DeliveryResult::failure(
                "rate limit exceeded",
                start.elapsed().as_millis() as u64,
            );
        }

        let message = self.build_message(notification, setting);
        let transport = Arc::clone(&self.transport);

        let send_result =
            tokio::task::spawn_blocking(move || transport.send(&message)).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match send_result {
            Ok(Ok(())) => {
                debug!(notification = %notification.id, "Email delivered");
                DeliveryResult {
                    success: true,
                    duration_ms,
                    ..DeliveryResult::default()
                }
            }
            Ok(Err(err)) => DeliveryResult::failure(err, duration_ms),
            Err(join_err) => DeliveryResult::failure(join_err.to_string(), duration_ms),
        }
    }
}
