//! # Notification Scenarios
//!
//! Webhook retry-then-succeed against a real (flaky) HTTP endpoint, and
//! email rate limiting observed through the service surface.

#[cfg(test)]
mod tests {
    use cs_02_kv_store::MemoryStore;
    use cs_07_notifier::{
        EmailConfig, EmailHandler, EmailMessage, NotificationSetting, NotificationStatus,
        NotifierConfig, NotifierService, NotifierStore, SettingType, SmtpSender, WebhookConfig,
        WebhookHandler,
    };
    use parking_lot::Mutex;
    use shared_bus::{BlockPayload, ChainEvent, EventBus, EventKind};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP endpoint answering 500 for the first `fail_first`
    /// requests and 200 afterwards.
    async fn flaky_endpoint(fail_first: u32) -> (SocketAddr, Arc<AtomicU32>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;

                let status = if n < fail_first {
                    "500 Internal Server Error"
                } else {
                    "200 OK"
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (addr, hits)
    }

    async fn wait_for<F: Fn() -> bool>(deadline_ms: u64, check: F) -> bool {
        for _ in 0..(deadline_ms / 5).max(1) {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    // Scenario: the endpoint fails twice, then accepts. Exactly three
    // attempts are recorded, the notification ends sent, and the stats
    // count one success and no failures.
    #[tokio::test]
    async fn test_webhook_retry_then_succeed() {
        let (addr, hits) = flaky_endpoint(2).await;

        let store = NotifierStore::new(Arc::new(MemoryStore::new()));
        let bus = EventBus::new();
        let config = NotifierConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            multiplier: 2.0,
            ..NotifierConfig::for_testing()
        };
        let handler = Arc::new(WebhookHandler::new(WebhookConfig::default()).unwrap());
        let service = NotifierService::new(store, bus.clone(), config, vec![handler]);

        let mut setting =
            NotificationSetting::new("hook", SettingType::Webhook, vec![EventKind::Block]);
        setting.webhook_url = Some(format!("http://{addr}/hook"));
        setting.webhook_secret = Some("shh".into());
        service.upsert_setting(&setting).unwrap();
        service.start().unwrap();

        bus.publish(&ChainEvent::Block(BlockPayload {
            number: 11,
            ..BlockPayload::default()
        }));

        assert!(
            wait_for(10_000, || {
                service
                    .store()
                    .ids_by_status(NotificationStatus::Sent, 10)
                    .unwrap()
                    .len()
                    == 1
            })
            .await,
            "notification never reached sent"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let id = service
            .store()
            .ids_by_status(NotificationStatus::Sent, 10)
            .unwrap()
            .remove(0);

        let history = service.delivery_history(&id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].result.status_code, Some(500));
        assert_eq!(history[1].result.status_code, Some(500));
        assert_eq!(history[2].result.status_code, Some(200));
        let attempts: Vec<u32> = history.iter().map(|row| row.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);

        let stats = service.setting_stats("hook").unwrap();
        assert_eq!(stats.total_sent, 1);
        assert_eq!(stats.total_failed, 0);
        assert!(stats.avg_delivery_ms >= 0.0);

        service.stop(Duration::from_secs(1)).await;
    }

    #[derive(Default)]
    struct CountingSender {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl SmtpSender for CountingSender {
        fn send(&self, message: &EmailMessage) -> Result<(), String> {
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }

    // Scenario: with one email per minute allowed, the first test
    // dispatch reaches the (fake) SMTP transport and the second is
    // rejected by the limiter without dialing.
    #[tokio::test]
    async fn test_rate_limited_email_via_service() {
        let store = NotifierStore::new(Arc::new(MemoryStore::new()));
        let bus = EventBus::new();

        let transport = Arc::new(CountingSender::default());
        let email = Arc::new(EmailHandler::with_transport(
            EmailConfig {
                rate_limit_per_minute: 1,
                ..EmailConfig::default()
            },
            transport.clone(),
        ));
        let service =
            NotifierService::new(store, bus, NotifierConfig::for_testing(), vec![email]);

        let mut setting =
            NotificationSetting::new("mail", SettingType::Email, vec![EventKind::Block]);
        setting.email_to = vec!["ops@example.com".into()];
        service.upsert_setting(&setting).unwrap();

        let first = service.test_setting("mail").await.unwrap();
        assert!(first.success);
        assert_eq!(transport.sent.lock().len(), 1);

        let second = service.test_setting("mail").await.unwrap();
        assert!(!second.success);
        assert!(second.error.as_deref().unwrap().contains("rate limit"));
        // The limiter rejected before any transport call.
        assert_eq!(transport.sent.lock().len(), 1);
    }

    // A second enabled setting matching the same event gets its own
    // notification row; a disabled one gets nothing.
    #[tokio::test]
    async fn test_fanout_across_settings() {
        let (addr, _hits) = flaky_endpoint(0).await;

        let store = NotifierStore::new(Arc::new(MemoryStore::new()));
        let bus = EventBus::new();
        let handler = Arc::new(WebhookHandler::new(WebhookConfig::default()).unwrap());
        let service = NotifierService::new(
            store,
            bus.clone(),
            NotifierConfig::for_testing(),
            vec![handler],
        );

        for (id, enabled) in [("a", true), ("b", true), ("c", false)] {
            let mut setting =
                NotificationSetting::new(id, SettingType::Webhook, vec![EventKind::Block]);
            setting.webhook_url = Some(format!("http://{addr}/{id}"));
            setting.enabled = enabled;
            service.upsert_setting(&setting).unwrap();
        }
        service.start().unwrap();

        bus.publish(&ChainEvent::Block(BlockPayload::default()));

        assert!(
            wait_for(5_000, || {
                service
                    .store()
                    .ids_by_status(NotificationStatus::Sent, 10)
                    .unwrap()
                    .len()
                    == 2
            })
            .await,
            "expected two sent notifications"
        );
        assert!(service.store().ids_by_setting("c", 10).unwrap().is_empty());

        service.stop(Duration::from_secs(1)).await;
    }
}
