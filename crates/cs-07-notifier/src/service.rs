//! # Notifier Service
//!
//! Lifecycle: `start` validates config, loads the settings mirror,
//! subscribes to the bus, and spawns the worker pool plus the retry and
//! cleanup pollers; `stop` cancels and waits out a caller deadline.
//!
//! Per bus event the service snapshot-iterates the enabled settings,
//! persists one notification row per match, and try-sends its id onto the
//! bounded queue. A full queue drops the enqueue; the persisted row stays
//! `pending` and the retry poller rediscovers it.

use crate::config::NotifierConfig;
use crate::domain::{
    DeliveryHistory, DeliveryResult, Notification, NotificationSetting, NotificationStatus,
    SettingStats, SettingType,
};
use crate::error::NotifyError;
use crate::handlers::NotificationHandler;
use crate::store::NotifierStore;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use shared_bus::{ChainEvent, EventBus, EventFilter, EventKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pending ids fetched per retry-poller pass.
const RETRY_BATCH: usize = 256;

/// The notification service.
pub struct NotifierService {
    store: NotifierStore,
    bus: EventBus,
    config: NotifierConfig,
    settings: RwLock<HashMap<String, NotificationSetting>>,
    handlers: HashMap<SettingType, Arc<dyn NotificationHandler>>,
    queue_tx: mpsc::Sender<String>,
    queue_rx: Mutex<Option<mpsc::Receiver<String>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotifierService {
    /// Assemble the service. Handlers are keyed by their channel.
    #[must_use]
    pub fn new(
        store: NotifierStore,
        bus: EventBus,
        config: NotifierConfig,
        handlers: Vec<Arc<dyn NotificationHandler>>,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_size.max(1));
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.kind(), handler))
            .collect();

        Arc::new(Self {
            store,
            bus,
            config,
            settings: RwLock::new(HashMap::new()),
            handlers,
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Validate config, load settings, and launch the background tasks.
    pub fn start(self: &Arc<Self>) -> Result<(), NotifyError> {
        self.config.validate()?;

        let loaded = self.store.settings()?;
        info!(settings = loaded.len(), "Notifier starting");
        {
            let mut mirror = self.settings.write();
            for setting in loaded {
                mirror.insert(setting.id.clone(), setting);
            }
        }

        let queue_rx = self
            .queue_rx
            .lock()
            .take()
            .ok_or_else(|| NotifyError::InvalidConfig("service already started".into()))?;
        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));

        let mut tasks = self.tasks.lock();
        for worker_id in 0..self.config.workers {
            tasks.push(self.spawn_worker(worker_id, Arc::clone(&queue_rx)));
        }
        tasks.push(self.spawn_event_task());
        tasks.push(self.spawn_retry_poller());
        tasks.push(self.spawn_cleanup_poller());
        Ok(())
    }

    /// Cancel and wait for the background tasks, up to `deadline`.
    pub async fn stop(&self, deadline: Duration) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        let drain = async {
            for task in tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(deadline, drain).await.is_err() {
            warn!("Notifier stop deadline expired, tasks aborted");
        }
        info!("Notifier stopped");
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    fn spawn_event_task(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut subscription = service.bus.subscribe(
                "notifier",
                [EventKind::Block, EventKind::Transaction, EventKind::Log],
                EventFilter::all(),
                service.config.queue_size,
            );
            loop {
                tokio::select! {
                    () = service.cancel.cancelled() => break,
                    maybe = subscription.recv() => {
                        let Some(event) = maybe else { break };
                        service.handle_event(&event);
                    }
                }
            }
        })
    }

    fn spawn_worker(
        self: &Arc<Self>,
        worker_id: usize,
        queue: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let id = {
                    let mut rx = queue.lock().await;
                    tokio::select! {
                        () = service.cancel.cancelled() => break,
                        maybe = rx.recv() => match maybe {
                            Some(id) => id,
                            None => break,
                        },
                    }
                };
                if let Err(err) = service.process_notification(&id).await {
                    warn!(worker = worker_id, notification = %id, error = %err, "Delivery processing failed");
                }
            }
        })
    }

    fn spawn_retry_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.config.flush_interval);
            loop {
                tokio::select! {
                    () = service.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = service.flush_due() {
                            warn!(error = %err, "Retry poll failed");
                        }
                    }
                }
            }
        })
    }

    fn spawn_cleanup_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.config.cleanup_interval);
            // The first tick fires immediately; skip it so startup does not
            // race a cleanup against settings load.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = service.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let cutoff = Utc::now()
                            - chrono::Duration::from_std(service.config.history_retention)
                                .unwrap_or_else(|_| chrono::Duration::days(7));
                        match service.store.cleanup_history(cutoff) {
                            Ok(removed) if removed > 0 => {
                                debug!(removed, "History cleanup");
                            }
                            Ok(_) => {}
                            Err(err) => warn!(error = %err, "History cleanup failed"),
                        }
                    }
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Event path
    // ------------------------------------------------------------------

    fn handle_event(&self, event: &ChainEvent) {
        let matching: Vec<NotificationSetting> = {
            let mirror = self.settings.read();
            mirror
                .values()
                .filter(|setting| setting.wants(event))
                .cloned()
                .collect()
        };

        for setting in matching {
            let notification = Notification::new(&setting, event.kind(), event.payload_json());
            if let Err(err) = self.store.create_notification(&notification) {
                warn!(setting = %setting.id, error = %err, "Notification persist failed");
                continue;
            }
            match self.queue_tx.try_send(notification.id.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // The persisted pending row keeps it durable; the retry
                    // poller will pick it up.
                    warn!(notification = %notification.id, "Queue full, deferred to poller");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(notification = %notification.id, "Queue closed");
                }
            }
        }
    }

    fn flush_due(&self) -> Result<(), NotifyError> {
        let due = self.store.due_pending(Utc::now(), RETRY_BATCH)?;
        for id in due {
            let Some(notification) = self.store.notification(&id)? else {
                continue;
            };
            if notification.status.is_terminal() {
                continue;
            }
            // Retrying rows without a schedule are in a worker's hands.
            if notification.status == NotificationStatus::Retrying
                && notification.next_retry.is_none()
            {
                continue;
            }
            if self.queue_tx.try_send(id).is_err() {
                break;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    async fn process_notification(&self, id: &str) -> Result<(), NotifyError> {
        let Some(mut notification) = self.store.notification(id)? else {
            return Ok(());
        };
        if notification.status.is_terminal() {
            return Ok(());
        }

        let Some(setting) = self.store.setting(&notification.setting_id)? else {
            notification.status = NotificationStatus::Failed;
            notification.error = Some("setting no longer exists".into());
            notification.next_retry = None;
            return self.store.update_notification(&notification);
        };

        let Some(handler) = self.handlers.get(&setting.setting_type) else {
            notification.status = NotificationStatus::Failed;
            notification.error = Some(format!("no handler for {}", setting.setting_type.as_str()));
            notification.next_retry = None;
            return self.store.update_notification(&notification);
        };

        notification.status = NotificationStatus::Retrying;
        notification.next_retry = None;
        self.store.update_notification(&notification)?;

        let result = handler.deliver(&notification, &setting).await;
        let now = Utc::now();

        self.store.append_history(&DeliveryHistory {
            notification_id: notification.id.clone(),
            setting_id: setting.id.clone(),
            attempt: notification.retry_count + 1,
            result: result.clone(),
            timestamp: now,
        })?;

        let mut stats = self.store.stats(&setting.id)?;
        if result.success {
            notification.status = NotificationStatus::Sent;
            notification.sent_at = Some(now);
            notification.error = None;
            self.store.update_notification(&notification)?;

            stats.record_success(result.duration_ms, now);
            self.store.save_stats(&stats)?;
        } else {
            notification.retry_count += 1;
            notification.error = result.error.clone();

            if notification.retry_count >= self.config.max_attempts {
                notification.status = NotificationStatus::Failed;
                notification.next_retry = None;
                self.store.update_notification(&notification)?;

                stats.record_failure(now);
                self.store.save_stats(&stats)?;
            } else {
                let delay = self.config.retry_delay(notification.retry_count);
                notification.status = NotificationStatus::Retrying;
                notification.next_retry = Some(
                    now + chrono::Duration::from_std(delay)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
                );
                self.store.update_notification(&notification)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Settings API
    // ------------------------------------------------------------------

    /// Validate and persist a setting, updating the in-memory mirror.
    pub fn upsert_setting(&self, setting: &NotificationSetting) -> Result<(), NotifyError> {
        let handler = self
            .handlers
            .get(&setting.setting_type)
            .ok_or_else(|| NotifyError::NoHandler(setting.setting_type.as_str().into()))?;
        handler.validate(setting)?;

        self.store.save_setting(setting)?;
        let stored = self
            .store
            .setting(&setting.id)?
            .ok_or_else(|| NotifyError::NotFound(format!("setting {}", setting.id)))?;
        self.settings.write().insert(stored.id.clone(), stored);
        Ok(())
    }

    /// Delete a setting from the store and the mirror.
    pub fn delete_setting(&self, id: &str) -> Result<(), NotifyError> {
        self.store.delete_setting(id)?;
        self.settings.write().remove(id);
        Ok(())
    }

    /// Snapshot of all known settings.
    #[must_use]
    pub fn list_settings(&self) -> Vec<NotificationSetting> {
        self.settings.read().values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Manual operations
    // ------------------------------------------------------------------

    /// Reset a notification for redelivery and enqueue it.
    ///
    /// Terminal notifications stay terminal.
    pub fn retry_notification(&self, id: &str) -> Result<(), NotifyError> {
        let mut notification = self
            .store
            .notification(id)?
            .ok_or_else(|| NotifyError::NotFound(format!("notification {id}")))?;

        if notification.status.is_terminal() {
            return Err(NotifyError::Terminal {
                id: id.to_string(),
                status: notification.status.as_str().to_string(),
            });
        }

        notification.retry_count = 0;
        notification.status = NotificationStatus::Pending;
        notification.next_retry = None;
        notification.error = None;
        self.store.update_notification(&notification)?;

        let _ = self.queue_tx.try_send(notification.id);
        Ok(())
    }

    /// Cancel a non-terminal notification.
    pub fn cancel_notification(&self, id: &str) -> Result<(), NotifyError> {
        let mut notification = self
            .store
            .notification(id)?
            .ok_or_else(|| NotifyError::NotFound(format!("notification {id}")))?;

        if notification.status.is_terminal() {
            return Err(NotifyError::Terminal {
                id: id.to_string(),
                status: notification.status.as_str().to_string(),
            });
        }

        notification.status = NotificationStatus::Cancelled;
        notification.next_retry = None;
        self.store.update_notification(&notification)
    }

    /// Dispatch a fabricated block notification through the setting's
    /// handler, bypassing the queue. The result is returned, not stored.
    pub async fn test_setting(&self, id: &str) -> Result<DeliveryResult, NotifyError> {
        let setting = self
            .store
            .setting(id)?
            .ok_or_else(|| NotifyError::NotFound(format!("setting {id}")))?;
        let handler = self
            .handlers
            .get(&setting.setting_type)
            .ok_or_else(|| NotifyError::NoHandler(setting.setting_type.as_str().into()))?;

        let sample = Notification::new(
            &setting,
            EventKind::Block,
            serde_json::json!({
                "number": 0,
                "hash": "0x0000000000000000000000000000000000000000000000000000000000000000",
                "test": true,
            }),
        );
        Ok(handler.deliver(&sample, &setting).await)
    }

    /// Stats for one setting.
    pub fn setting_stats(&self, id: &str) -> Result<SettingStats, NotifyError> {
        self.store.stats(id)
    }

    /// Delivery history for one notification.
    pub fn delivery_history(&self, id: &str) -> Result<Vec<DeliveryHistory>, NotifyError> {
        self.store.history(id)
    }

    /// The persisted store, for read-side queries.
    #[must_use]
    pub fn store(&self) -> &NotifierStore {
        &self.store
    }
}
