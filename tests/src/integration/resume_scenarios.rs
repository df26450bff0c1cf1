//! # Resume Delivery Scenarios
//!
//! Reconnect-with-backlog replay and the bus→session bridge.

#[cfg(test)]
mod tests {
    use cs_02_kv_store::{KvStore, MemoryStore};
    use cs_08_resume::{
        ConnectionManager, EventCache, ReconnectRequest, ResumeConfig, SessionStore,
    };
    use std::sync::Arc;

    fn manager() -> Arc<ConnectionManager> {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        ConnectionManager::new(
            SessionStore::new(kv.clone()),
            EventCache::new(kv),
            ResumeConfig::for_testing(),
        )
    }

    // Scenario: deliver e1..e2 live, disconnect, cache e3..e4, reconnect
    // with last_event_id = e2, and receive exactly
    // replay_start{2}, e3, e4, replay_end.
    #[tokio::test]
    async fn test_reconnect_with_backlog() {
        let manager = manager();
        let (tx, mut rx) = manager.channel();
        let session = manager.handle_connect("client-1", tx).unwrap();

        let _e1 = manager
            .deliver_event(&session.id, "block", serde_json::json!({"n": 1}))
            .unwrap();
        let e2 = manager
            .deliver_event(&session.id, "block", serde_json::json!({"n": 2}))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap().payload["n"], 1);
        assert_eq!(rx.try_recv().unwrap().payload["n"], 2);

        manager.handle_disconnect(&session.id).unwrap();

        let e3 = manager
            .deliver_event(&session.id, "block", serde_json::json!({"n": 3}))
            .unwrap();
        let e4 = manager
            .deliver_event(&session.id, "block", serde_json::json!({"n": 4}))
            .unwrap();

        let (tx2, mut rx2) = manager.channel();
        let (resumed, missed) = manager
            .handle_reconnect(
                &ReconnectRequest {
                    session_id: session.id.clone(),
                    last_event_id: Some(e2),
                },
                tx2,
            )
            .unwrap();
        assert_eq!(resumed.id, session.id);

        let missed_ids: Vec<&str> = missed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(missed_ids, vec![e3.as_str(), e4.as_str()]);

        manager.replay_events(&session.id, &missed).unwrap();

        let start = rx2.try_recv().unwrap();
        assert_eq!(start.kind, "replay_start");
        assert_eq!(start.payload["count"], 2);

        let m3 = rx2.try_recv().unwrap();
        assert_eq!(m3.payload["n"], 3);
        assert!(m3.meta.unwrap().replay);

        let m4 = rx2.try_recv().unwrap();
        assert_eq!(m4.payload["n"], 4);

        assert_eq!(rx2.try_recv().unwrap().kind, "replay_end");
        assert!(rx2.try_recv().is_err(), "no extra messages after replay_end");
    }

    // Reconnect with no last_event_id replays the whole cached window.
    #[tokio::test]
    async fn test_reconnect_without_cursor_replays_everything() {
        let manager = manager();
        let (tx, _rx) = manager.channel();
        let session = manager.handle_connect("client-1", tx).unwrap();
        manager.handle_disconnect(&session.id).unwrap();

        for n in 0..3 {
            manager
                .deliver_event(&session.id, "block", serde_json::json!({"n": n}))
                .unwrap();
        }

        let (tx2, _rx2) = manager.channel();
        let (_session, missed) = manager
            .handle_reconnect(
                &ReconnectRequest {
                    session_id: session.id.clone(),
                    last_event_id: None,
                },
                tx2,
            )
            .unwrap();
        assert_eq!(missed.len(), 3);

        // Cached events arrive in timestamp order.
        let stamps: Vec<_> = missed.iter().map(|e| e.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    // The bridge fan-out: broadcast reaches connected sessions that want
    // the topic and skips others.
    #[tokio::test]
    async fn test_broadcast_respects_subscriptions() {
        let manager = manager();

        let (tx_all, mut rx_all) = manager.channel();
        let all = manager.handle_connect("client-all", tx_all).unwrap();

        let (tx_filtered, mut rx_filtered) = manager.channel();
        let filtered = manager.handle_connect("client-filtered", tx_filtered).unwrap();
        manager.add_subscription(&filtered.id, "transaction").unwrap();

        let delivered = manager.broadcast_event("block", &serde_json::json!({"n": 9}));
        assert_eq!(delivered, 1, "only the unfiltered session wants blocks");

        assert_eq!(rx_all.try_recv().unwrap().kind, "block");
        assert!(rx_filtered.try_recv().is_err());

        let delivered = manager.broadcast_event("transaction", &serde_json::json!({"n": 1}));
        assert_eq!(delivered, 2);
        let _ = all;
    }
}
