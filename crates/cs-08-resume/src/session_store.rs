//! # Session Store
//!
//! Session rows plus the client-id and state indices. `get` applies the
//! TTL contract: an expired session is surfaced as an error that carries
//! the stale row for inspection.

use crate::domain::{Session, SessionState};
use crate::error::ResumeError;
use crate::keys;
use chrono::Utc;
use cs_02_kv_store::{BatchOp, KvStore};
use std::sync::Arc;

fn encode(session: &Session) -> Result<Vec<u8>, ResumeError> {
    serde_json::to_vec(session).map_err(ResumeError::codec)
}

fn decode(bytes: &[u8]) -> Result<Session, ResumeError> {
    serde_json::from_slice(bytes).map_err(ResumeError::codec)
}

/// Session persistence over the KV store.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    /// Wrap a KV store.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Insert or update a session, re-keying the state index.
    pub fn save(&self, session: &Session) -> Result<(), ResumeError> {
        let mut ops = Vec::new();

        if let Some(previous) = self.load(&session.id)? {
            if previous.state != session.state {
                ops.push(BatchOp::delete(keys::idx_state(previous.state, &session.id)));
            }
        }

        ops.push(BatchOp::put(keys::session(&session.id), encode(session)?));
        ops.push(BatchOp::put(
            keys::idx_client(&session.client_id),
            session.id.clone().into_bytes(),
        ));
        ops.push(BatchOp::put(
            keys::idx_state(session.state, &session.id),
            session.id.clone().into_bytes(),
        ));

        self.kv.write_batch(ops)?;
        Ok(())
    }

    /// Raw load without TTL semantics.
    pub fn load(&self, id: &str) -> Result<Option<Session>, ResumeError> {
        match self.kv.get(&keys::session(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load with the TTL contract: absent rows are [`ResumeError::NotFound`],
    /// expired rows are [`ResumeError::Expired`] with the row attached.
    pub fn get(&self, id: &str) -> Result<Session, ResumeError> {
        let session = self
            .load(id)?
            .ok_or_else(|| ResumeError::NotFound(id.to_string()))?;

        if session.state == SessionState::Expired || session.is_expired(Utc::now()) {
            return Err(ResumeError::Expired(Box::new(session)));
        }
        Ok(session)
    }

    /// The session currently bound to `client_id`, if any.
    pub fn find_by_client(&self, client_id: &str) -> Result<Option<Session>, ResumeError> {
        let Some(id_bytes) = self.kv.get(&keys::idx_client(client_id))? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&id_bytes).into_owned();
        self.load(&id)
    }

    /// Ids of every session in `state`.
    pub fn ids_in_state(&self, state: SessionState) -> Result<Vec<String>, ResumeError> {
        let mut ids = Vec::new();
        self.kv
            .iterate_prefix(&keys::idx_state_prefix(state), &mut |_, value| {
                ids.push(String::from_utf8_lossy(value).into_owned());
                true
            })?;
        Ok(ids)
    }

    /// Remove a session and its index rows.
    pub fn delete(&self, id: &str) -> Result<(), ResumeError> {
        let Some(session) = self.load(id)? else {
            return Ok(());
        };
        self.kv.write_batch(vec![
            BatchOp::delete(keys::session(id)),
            BatchOp::delete(keys::idx_client(&session.client_id)),
            BatchOp::delete(keys::idx_state(session.state, id)),
        ])?;
        Ok(())
    }
}
