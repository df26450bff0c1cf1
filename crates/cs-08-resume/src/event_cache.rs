//! # Event Cache
//!
//! Replayable per-session event rows plus a `(session, timestamp, id)`
//! ordering index. `get_after` walks the index in order and starts
//! emitting strictly after the caller's last-seen event id.

use crate::domain::CachedEvent;
use crate::error::ResumeError;
use crate::keys;
use chrono::{DateTime, Utc};
use cs_02_kv_store::{BatchOp, KvStore};
use std::sync::Arc;
use tracing::debug;

fn encode(event: &CachedEvent) -> Result<Vec<u8>, ResumeError> {
    serde_json::to_vec(event).map_err(ResumeError::codec)
}

fn decode(bytes: &[u8]) -> Result<CachedEvent, ResumeError> {
    serde_json::from_slice(bytes).map_err(ResumeError::codec)
}

/// Cached-event persistence over the KV store.
#[derive(Clone)]
pub struct EventCache {
    kv: Arc<dyn KvStore>,
}

impl EventCache {
    /// Wrap a KV store.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Persist one event and its ordering-index row.
    pub fn store(&self, event: &CachedEvent) -> Result<(), ResumeError> {
        self.kv.write_batch(vec![
            BatchOp::put(keys::cache(&event.session_id, &event.id), encode(event)?),
            BatchOp::put(
                keys::cache_idx(&event.session_id, event.timestamp, &event.id),
                event.id.clone().into_bytes(),
            ),
        ])?;
        Ok(())
    }

    /// Load one event.
    pub fn get(&self, session_id: &str, event_id: &str) -> Result<Option<CachedEvent>, ResumeError> {
        match self.kv.get(&keys::cache(session_id, event_id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Events after `last_event_id` in ascending timestamp order, up to
    /// `limit`. `None` (or an unknown id) returns from the beginning.
    pub fn get_after(
        &self,
        session_id: &str,
        last_event_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CachedEvent>, ResumeError> {
        let mut ordered_ids = Vec::new();
        self.kv
            .iterate_prefix(&keys::cache_idx_prefix(session_id), &mut |_, value| {
                ordered_ids.push(String::from_utf8_lossy(value).into_owned());
                true
            })?;

        let start = match last_event_id {
            Some(last) => ordered_ids
                .iter()
                .position(|id| id == last)
                .map_or(0, |pos| pos + 1),
            None => 0,
        };

        let mut events = Vec::new();
        for id in ordered_ids.into_iter().skip(start).take(limit) {
            if let Some(event) = self.get(session_id, &id)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Best-effort delivered marking; replay correctness does not depend
    /// on it (the session's `last_event_id` is authoritative).
    pub fn mark_delivered(&self, session_id: &str, event_id: &str) -> Result<(), ResumeError> {
        if let Some(mut event) = self.get(session_id, event_id)? {
            event.delivered = true;
            self.kv
                .put(&keys::cache(session_id, event_id), &encode(&event)?)?;
        }
        Ok(())
    }

    /// Remove events older than `cutoff` across every session.
    /// Returns rows removed.
    pub fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize, ResumeError> {
        let idx_prefix = keys::CACHE_IDX.as_bytes();
        let mut stale: Vec<BatchOp> = Vec::new();
        let mut removed = 0usize;

        self.kv
            .iterate_prefix(keys::CACHE.as_bytes(), &mut |key, value| {
                // The ordering index shares the /rs/cache/ prefix; rows
                // and index entries are swept together.
                if key.starts_with(idx_prefix) {
                    return true;
                }
                if let Ok(event) = decode(value) {
                    if event.timestamp < cutoff {
                        stale.push(BatchOp::delete(key.to_vec()));
                        stale.push(BatchOp::delete(keys::cache_idx(
                            &event.session_id,
                            event.timestamp,
                            &event.id,
                        )));
                        removed += 1;
                    }
                }
                true
            })?;

        if !stale.is_empty() {
            self.kv.write_batch(stale)?;
            debug!(removed, "Event cache cleanup");
        }
        Ok(removed)
    }
}
