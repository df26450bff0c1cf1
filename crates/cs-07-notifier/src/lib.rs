//! # Notifier (Subsystem 7)
//!
//! Turns bus events into outbound notifications.
//!
//! Settings persist in the KV store and are mirrored in memory; each
//! matching bus event creates a durable notification row and enqueues it
//! onto a bounded work queue (drop-on-full: the persisted `pending` row is
//! rediscovered by the retry poller). Workers dispatch to the handler
//! registered for the setting's channel, record a delivery-history row per
//! attempt, and drive the status machine:
//!
//! ```text
//! pending → retrying → (sent | retrying | failed | cancelled)
//! ```
//!
//! `sent`, `failed`, and `cancelled` are terminal.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod keys;
pub mod rate_limit;
pub mod service;
pub mod store;

pub use config::NotifierConfig;
pub use domain::{
    DeliveryHistory, DeliveryResult, Notification, NotificationFilter, NotificationSetting,
    NotificationStatus, SettingStats, SettingType,
};
pub use error::NotifyError;
pub use handlers::email::{EmailConfig, EmailHandler, EmailMessage, SmtpSender};
pub use handlers::slack::{SlackConfig, SlackHandler};
pub use handlers::webhook::{sign_payload, verify_signature, WebhookConfig, WebhookHandler};
pub use handlers::NotificationHandler;
pub use rate_limit::MinuteBucket;
pub use service::NotifierService;
pub use store::NotifierStore;
