//! # Delivery Handlers
//!
//! One handler per channel. A handler validates a setting's destination
//! fields up front and performs one delivery attempt on demand; failures
//! (including rate limiting) are folded into the returned
//! [`DeliveryResult`] and drive the service's retry machine.

pub mod email;
pub mod slack;
pub mod webhook;

use crate::domain::{DeliveryResult, Notification, NotificationSetting, SettingType};
use crate::error::NotifyError;
use async_trait::async_trait;

/// A notification delivery strategy keyed by channel.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// The channel this handler serves.
    fn kind(&self) -> SettingType;

    /// Validate a setting's destination fields.
    fn validate(&self, setting: &NotificationSetting) -> Result<(), NotifyError>;

    /// Perform one delivery attempt.
    async fn deliver(
        &self,
        notification: &Notification,
        setting: &NotificationSetting,
    ) -> DeliveryResult;
}
