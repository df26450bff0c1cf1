//! # Connection Manager
//!
//! Owns the in-memory map of live connections and the connect /
//! disconnect / reconnect / deliver / replay semantics over the session
//! store and event cache. Every outbound event is cached before any live
//! send; channel sends never block.

use crate::domain::{CachedEvent, OutboundMessage, ReconnectRequest, Session, SessionState};
use crate::error::ResumeError;
use crate::event_cache::EventCache;
use crate::session_store::SessionStore;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Resume subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeConfig {
    /// Session TTL measured from last activity.
    #[serde(with = "duration_millis")]
    pub session_ttl: Duration,

    /// Maximum events returned per reconnect replay.
    pub max_events_per_session: usize,

    /// Per-session outbound channel capacity.
    pub send_buffer: usize,

    /// Background expiry sweep interval.
    #[serde(with = "duration_millis")]
    pub cleanup_period: Duration,

    /// Cached events older than this are swept.
    #[serde(with = "duration_millis")]
    pub cache_window: Duration,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(30 * 60),
            max_events_per_session: 500,
            send_buffer: 256,
            cleanup_period: Duration::from_secs(60),
            cache_window: Duration::from_secs(60 * 60),
        }
    }
}

impl ResumeConfig {
    /// Config for tests: tight timings, small buffers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            session_ttl: Duration::from_secs(5),
            max_events_per_session: 50,
            send_buffer: 8,
            cleanup_period: Duration::from_millis(50),
            cache_window: Duration::from_secs(60),
        }
    }
}

/// The session-aware outbound delivery manager.
pub struct ConnectionManager {
    sessions: SessionStore,
    cache: EventCache,
    config: ResumeConfig,
    active: DashMap<String, mpsc::Sender<OutboundMessage>>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Assemble the manager.
    #[must_use]
    pub fn new(sessions: SessionStore, cache: EventCache, config: ResumeConfig) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            cache,
            config,
            active: DashMap::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// The cancellation token governing background cleanup.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Open a per-session outbound channel pair sized from config.
    #[must_use]
    pub fn channel(&self) -> (mpsc::Sender<OutboundMessage>, mpsc::Receiver<OutboundMessage>) {
        mpsc::channel(self.config.send_buffer.max(1))
    }

    /// Handle a fresh client connection.
    ///
    /// A known client id with an unexpired session reactivates that
    /// session; otherwise a new session is created with the configured
    /// TTL.
    pub fn handle_connect(
        &self,
        client_id: &str,
        send: mpsc::Sender<OutboundMessage>,
    ) -> Result<Session, ResumeError> {
        let now = Utc::now();

        if let Some(mut existing) = self.sessions.find_by_client(client_id)? {
            if existing.state != SessionState::Expired && !existing.is_expired(now) {
                existing.state = SessionState::Active;
                existing.touch(now);
                self.sessions.save(&existing)?;
                self.active.insert(existing.id.clone(), send);
                debug!(session = %existing.id, client = client_id, "Session reactivated");
                return Ok(existing);
            }
        }

        let session = Session::new(client_id, self.config.session_ttl);
        self.sessions.save(&session)?;
        self.active.insert(session.id.clone(), send);
        info!(session = %session.id, client = client_id, "Session created");
        Ok(session)
    }

    /// Handle a connection drop. The session row stays until TTL expiry.
    pub fn handle_disconnect(&self, session_id: &str) -> Result<(), ResumeError> {
        self.active.remove(session_id);

        let Some(mut session) = self.sessions.load(session_id)? else {
            return Ok(());
        };
        session.state = SessionState::Disconnected;
        self.sessions.save(&session)?;
        debug!(session = %session_id, "Session disconnected");
        Ok(())
    }

    /// Handle a reconnect: reactivate the session and return the events
    /// cached after the client's last-seen id.
    pub fn handle_reconnect(
        &self,
        request: &ReconnectRequest,
        send: mpsc::Sender<OutboundMessage>,
    ) -> Result<(Session, Vec<CachedEvent>), ResumeError> {
        let mut session = self.sessions.get(&request.session_id)?;
        session.state = SessionState::Active;
        session.touch(Utc::now());
        self.sessions.save(&session)?;
        self.active.insert(session.id.clone(), send);

        let missed = self.cache.get_after(
            &session.id,
            request.last_event_id.as_deref(),
            self.config.max_events_per_session,
        )?;
        debug!(session = %session.id, missed = missed.len(), "Session reconnected");
        Ok((session, missed))
    }

    /// Cache an event for a session and attempt a live send.
    ///
    /// The cache write comes first so reconnect replay is durable; the
    /// live send is non-blocking and a full channel simply leaves the
    /// event for replay. Returns the cached event's id.
    pub fn deliver_event(
        &self,
        session_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<String, ResumeError> {
        let event = CachedEvent::new(session_id, event_type, payload);
        self.cache.store(&event)?;

        if let Some(sender) = self.active.get(session_id) {
            match sender.try_send(OutboundMessage::event(&event, false)) {
                Ok(()) => {
                    let _ = self.cache.mark_delivered(session_id, &event.id);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Stays cached for replay.
                    warn!(session = %session_id, "Send channel full, event cached only");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(session = %session_id, "Send channel closed");
                }
            }
        }

        if let Some(mut session) = self.sessions.load(session_id)? {
            session.last_event_id = Some(event.id.clone());
            self.sessions.save(&session)?;
        }

        Ok(event.id)
    }

    /// Replay cached events over a session's channel, bracketed by
    /// `replay_start {count}` and `replay_end`. Non-blocking; a filled
    /// channel stops the replay early.
    pub fn replay_events(&self, session_id: &str, events: &[CachedEvent]) -> Result<(), ResumeError> {
        let sender = self
            .active
            .get(session_id)
            .ok_or_else(|| ResumeError::NotConnected(session_id.to_string()))?;

        if sender
            .try_send(OutboundMessage::replay_start(events.len()))
            .is_err()
        {
            return Ok(());
        }
        for event in events {
            if sender.try_send(OutboundMessage::event(event, true)).is_err() {
                warn!(session = %session_id, "Replay interrupted by full channel");
                return Ok(());
            }
        }
        let _ = sender.try_send(OutboundMessage::replay_end());
        Ok(())
    }

    /// Mark sessions whose TTL elapsed as expired and drop their
    /// connections. Returns sessions expired.
    pub fn expire_old_sessions(&self) -> Result<usize, ResumeError> {
        let now = Utc::now();
        let mut expired = 0usize;

        for state in [SessionState::Active, SessionState::Disconnected] {
            for id in self.sessions.ids_in_state(state)? {
                let Some(mut session) = self.sessions.load(&id)? else {
                    continue;
                };
                if session.is_expired(now) {
                    session.state = SessionState::Expired;
                    self.sessions.save(&session)?;
                    self.active.remove(&id);
                    expired += 1;
                }
            }
        }

        if expired > 0 {
            info!(expired, "Sessions expired");
        }
        Ok(expired)
    }

    /// Number of sessions with a live connection.
    #[must_use]
    pub fn active_session_count(&self) -> usize {
        self.active.len()
    }

    /// Deliver an event to every connected session that wants the topic.
    ///
    /// Sessions with no recorded subscriptions receive everything; a
    /// session with subscriptions receives only active topics. Returns
    /// the number of sessions the event was delivered-or-cached for.
    pub fn broadcast_event(&self, event_type: &str, payload: &serde_json::Value) -> usize {
        let ids: Vec<String> = self.active.iter().map(|entry| entry.key().clone()).collect();
        let mut count = 0usize;

        for id in ids {
            let wants = match self.sessions.load(&id) {
                Ok(Some(session)) => {
                    session.subscriptions.is_empty()
                        || session
                            .subscriptions
                            .get(event_type)
                            .is_some_and(|sub| sub.active)
                }
                _ => false,
            };
            if wants && self.deliver_event(&id, event_type, payload.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Record a topic subscription on a session.
    pub fn add_subscription(&self, session_id: &str, topic: &str) -> Result<(), ResumeError> {
        let mut session = self.sessions.get(session_id)?;
        session.subscriptions.insert(
            topic.to_string(),
            crate::domain::TopicSubscription {
                last_event_id: None,
                active: true,
                created_at: Utc::now(),
            },
        );
        self.sessions.save(&session)
    }

    /// Spawn the background expiry/cleanup sweep.
    pub fn start_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.cleanup_period);
            loop {
                tokio::select! {
                    () = manager.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = manager.expire_old_sessions() {
                            warn!(error = %err, "Session expiry sweep failed");
                        }
                        let cutoff = Utc::now()
                            - chrono::Duration::from_std(manager.config.cache_window)
                                .unwrap_or_else(|_| chrono::Duration::hours(1));
                        if let Err(err) = manager.cache.cleanup(cutoff) {
                            warn!(error = %err, "Event cache cleanup failed");
                        }
                    }
                }
            }
        })
    }
}
