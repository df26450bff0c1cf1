//! # Notifier Store
//!
//! Settings, notification rows, delivery history, and stats over the KV
//! store. Index rows (status, per-setting, pending) are maintained on
//! every status transition; the pending index is keyed by the next-retry
//! time (creation time until a retry is scheduled) so the retry poller
//! rediscovers rows the queue dropped.

use crate::domain::{
    DeliveryHistory, Notification, NotificationSetting, NotificationStatus, SettingStats,
};
use crate::error::NotifyError;
use crate::keys;
use chrono::{DateTime, Utc};
use cs_02_kv_store::{BatchOp, KvStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NotifyError> {
    serde_json::to_vec(value).map_err(NotifyError::codec)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, NotifyError> {
    serde_json::from_slice(bytes).map_err(NotifyError::codec)
}

/// Notification persistence over the KV store.
#[derive(Clone)]
pub struct NotifierStore {
    kv: Arc<dyn KvStore>,
}

impl NotifierStore {
    /// Wrap a KV store.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Insert or update a setting. `created_at` is preserved on update.
    pub fn save_setting(&self, setting: &NotificationSetting) -> Result<(), NotifyError> {
        let mut setting = setting.clone();
        if let Some(existing) = self.setting(&setting.id)? {
            setting.created_at = existing.created_at;
        }
        setting.updated_at = Utc::now();
        self.kv.put(&keys::setting(&setting.id), &encode(&setting)?)?;
        Ok(())
    }

    /// Load one setting.
    pub fn setting(&self, id: &str) -> Result<Option<NotificationSetting>, NotifyError> {
        match self.kv.get(&keys::setting(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load every setting.
    pub fn settings(&self) -> Result<Vec<NotificationSetting>, NotifyError> {
        let mut rows = Vec::new();
        let mut codec_err = None;
        self.kv
            .iterate_prefix(keys::SETTING.as_bytes(), &mut |_, value| {
                match decode::<NotificationSetting>(value) {
                    Ok(row) => {
                        rows.push(row);
                        true
                    }
                    Err(err) => {
                        codec_err = Some(err);
                        false
                    }
                }
            })?;
        match codec_err {
            Some(err) => Err(err),
            None => Ok(rows),
        }
    }

    /// Delete a setting.
    pub fn delete_setting(&self, id: &str) -> Result<(), NotifyError> {
        self.kv.delete(&keys::setting(id))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    fn index_ops(notification: &Notification, delete: bool) -> Vec<BatchOp> {
        let status_key = keys::idx_status(
            notification.status,
            notification.created_at,
            &notification.id,
        );
        let setting_key = keys::idx_setting(
            &notification.setting_id,
            notification.created_at,
            &notification.id,
        );
        let due = notification.next_retry.unwrap_or(notification.created_at);
        let pending_key = keys::idx_pending(due, &notification.id);
        let wants_pending = !notification.status.is_terminal();

        let mut ops = Vec::new();
        if delete {
            ops.push(BatchOp::delete(status_key));
            ops.push(BatchOp::delete(setting_key));
            ops.push(BatchOp::delete(pending_key));
        } else {
            let id = notification.id.clone().into_bytes();
            ops.push(BatchOp::put(status_key, id.clone()));
            ops.push(BatchOp::put(setting_key, id.clone()));
            if wants_pending {
                ops.push(BatchOp::put(pending_key, id));
            }
        }
        ops
    }

    /// Persist a new notification and its index rows.
    pub fn create_notification(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut ops = vec![BatchOp::put(
            keys::notification(&notification.id),
            encode(notification)?,
        )];
        ops.extend(Self::index_ops(notification, false));
        self.kv.write_batch(ops)?;
        Ok(())
    }

    /// Persist a status/field change, re-keying the index rows.
    pub fn update_notification(&self, notification: &Notification) -> Result<(), NotifyError> {
        let previous = self
            .notification(&notification.id)?
            .ok_or_else(|| NotifyError::NotFound(format!("notification {}", notification.id)))?;

        let mut ops = Self::index_ops(&previous, true);
        ops.push(BatchOp::put(
            keys::notification(&notification.id),
            encode(notification)?,
        ));
        ops.extend(Self::index_ops(notification, false));
        self.kv.write_batch(ops)?;
        Ok(())
    }

    /// Load one notification.
    pub fn notification(&self, id: &str) -> Result<Option<Notification>, NotifyError> {
        match self.kv.get(&keys::notification(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn collect_ids(&self, prefix: &[u8], limit: usize) -> Result<Vec<String>, NotifyError> {
        let mut ids = Vec::new();
        self.kv.iterate_prefix(prefix, &mut |_, value| {
            ids.push(String::from_utf8_lossy(value).into_owned());
            ids.len() < limit
        })?;
        Ok(ids)
    }

    /// Notification ids in `status`, oldest first.
    pub fn ids_by_status(
        &self,
        status: NotificationStatus,
        limit: usize,
    ) -> Result<Vec<String>, NotifyError> {
        self.collect_ids(&keys::idx_status_prefix(status), limit)
    }

    /// Notification ids of one setting, oldest first.
    pub fn ids_by_setting(&self, setting_id: &str, limit: usize) -> Result<Vec<String>, NotifyError> {
        self.collect_ids(&keys::idx_setting_prefix(setting_id), limit)
    }

    /// Ids in the pending index whose due time is at or before `now`.
    pub fn due_pending(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<String>, NotifyError> {
        let cutoff = keys::ts_nanos(now);
        let prefix = keys::IDX_PENDING.as_bytes();
        let mut ids = Vec::new();
        self.kv.iterate_prefix(prefix, &mut |key, value| {
            // Key layout: {prefix}{ts20}/{id}; stop at the first future row.
            let ts = &key[prefix.len()..prefix.len() + 20.min(key.len() - prefix.len())];
            if ts > cutoff.as_bytes() {
                return false;
            }
            ids.push(String::from_utf8_lossy(value).into_owned());
            ids.len() < limit
        })?;
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Delivery history
    // ------------------------------------------------------------------

    /// Append one history row.
    pub fn append_history(&self, row: &DeliveryHistory) -> Result<(), NotifyError> {
        self.kv.put(
            &keys::history(&row.notification_id, row.attempt),
            &encode(row)?,
        )?;
        Ok(())
    }

    /// Full history of one notification, ascending by attempt.
    pub fn history(&self, notification_id: &str) -> Result<Vec<DeliveryHistory>, NotifyError> {
        let mut rows = Vec::new();
        let mut codec_err = None;
        self.kv
            .iterate_prefix(&keys::history_prefix(notification_id), &mut |_, value| {
                match decode::<DeliveryHistory>(value) {
                    Ok(row) => {
                        rows.push(row);
                        true
                    }
                    Err(err) => {
                        codec_err = Some(err);
                        false
                    }
                }
            })?;
        match codec_err {
            Some(err) => Err(err),
            None => Ok(rows),
        }
    }

    /// Delete history rows older than `cutoff`. Returns rows removed.
    pub fn cleanup_history(&self, cutoff: DateTime<Utc>) -> Result<usize, NotifyError> {
        let mut stale: Vec<Vec<u8>> = Vec::new();
        self.kv
            .iterate_prefix(keys::HISTORY.as_bytes(), &mut |key, value| {
                if let Ok(row) = decode::<DeliveryHistory>(value) {
                    if row.timestamp < cutoff {
                        stale.push(key.to_vec());
                    }
                }
                true
            })?;

        let removed = stale.len();
        if !stale.is_empty() {
            self.kv
                .write_batch(stale.into_iter().map(BatchOp::delete).collect())?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Load a setting's stats, default-empty when absent.
    pub fn stats(&self, setting_id: &str) -> Result<SettingStats, NotifyError> {
        match self.kv.get(&keys::stats(setting_id))? {
            Some(bytes) => decode(&bytes),
            None => Ok(SettingStats {
                setting_id: setting_id.to_string(),
                ..SettingStats::default()
            }),
        }
    }

    /// Persist a setting's stats.
    pub fn save_stats(&self, stats: &SettingStats) -> Result<(), NotifyError> {
        self.kv
            .put(&keys::stats(&stats.setting_id), &encode(stats)?)?;
        Ok(())
    }
}
