//! # Notifier Keyspace
//!
//! Rows and secondary indices under `/notif/`. Timestamps in index keys
//! are 20-digit zero-padded nanoseconds so lexicographic order is
//! chronological.

use crate::domain::NotificationStatus;
use chrono::{DateTime, Utc};

/// Prefix for setting rows.
pub const SETTING: &str = "/notif/setting/";
/// Prefix for notification rows.
pub const NOTIF: &str = "/notif/notif/";
/// Prefix for the status index.
pub const IDX_STATUS: &str = "/notif/idx/status/";
/// Prefix for the per-setting index.
pub const IDX_SETTING: &str = "/notif/idx/setting/";
/// Prefix for the pending index, ordered by next-retry time.
pub const IDX_PENDING: &str = "/notif/idx/pending/";
/// Prefix for delivery-history rows.
pub const HISTORY: &str = "/notif/history/";
/// Prefix for per-setting stats.
pub const STATS: &str = "/notif/stats/";

/// Nanosecond timestamp as a 20-digit key component.
#[must_use]
pub fn ts_nanos(ts: DateTime<Utc>) -> String {
    format!("{:020}", ts.timestamp_nanos_opt().unwrap_or_default().max(0))
}

/// `/notif/setting/{id}`
#[must_use]
pub fn setting(id: &str) -> Vec<u8> {
    format!("{SETTING}{id}").into_bytes()
}

/// `/notif/notif/{id}`
#[must_use]
pub fn notification(id: &str) -> Vec<u8> {
    format!("{NOTIF}{id}").into_bytes()
}

/// `/notif/idx/status/{status}/{createdAtNanos}/{id}`
#[must_use]
pub fn idx_status(status: NotificationStatus, created_at: DateTime<Utc>, id: &str) -> Vec<u8> {
    format!("{IDX_STATUS}{}/{}/{id}", status.as_str(), ts_nanos(created_at)).into_bytes()
}

/// Prefix of one status's index.
#[must_use]
pub fn idx_status_prefix(status: NotificationStatus) -> Vec<u8> {
    format!("{IDX_STATUS}{}/", status.as_str()).into_bytes()
}

/// `/notif/idx/setting/{settingId}/{createdAtNanos}/{id}`
#[must_use]
pub fn idx_setting(setting_id: &str, created_at: DateTime<Utc>, id: &str) -> Vec<u8> {
    format!("{IDX_SETTING}{setting_id}/{}/{id}", ts_nanos(created_at)).into_bytes()
}

/// Prefix of one setting's index.
#[must_use]
pub fn idx_setting_prefix(setting_id: &str) -> Vec<u8> {
    format!("{IDX_SETTING}{setting_id}/").into_bytes()
}

/// `/notif/idx/pending/{dueNanos}/{id}`
#[must_use]
pub fn idx_pending(due: DateTime<Utc>, id: &str) -> Vec<u8> {
    format!("{IDX_PENDING}{}/{id}", ts_nanos(due)).into_bytes()
}

/// `/notif/history/{notifId}/{attempt}`
#[must_use]
pub fn history(notification_id: &str, attempt: u32) -> Vec<u8> {
    format!("{HISTORY}{notification_id}/{attempt:010}").into_bytes()
}

/// Prefix of one notification's history.
#[must_use]
pub fn history_prefix(notification_id: &str) -> Vec<u8> {
    format!("{HISTORY}{notification_id}/").into_bytes()
}

/// `/notif/stats/{settingId}`
#[must_use]
pub fn stats(setting_id: &str) -> Vec<u8> {
    format!("{STATS}{setting_id}").into_bytes()
}
