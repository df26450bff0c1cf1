//! # Resume Keyspace
//!
//! Session and cache rows under `/rs/`. Cache-index timestamps are
//! 20-digit zero-padded nanoseconds so iteration order is replay order.

use crate::domain::SessionState;
use chrono::{DateTime, Utc};

/// Prefix for session rows.
pub const SESSION: &str = "/rs/session/";
/// Prefix for the client-id index.
pub const IDX_CLIENT: &str = "/rs/session/idx/client/";
/// Prefix for the state index.
pub const IDX_STATE: &str = "/rs/session/idx/state/";
/// Prefix for cached-event rows.
pub const CACHE: &str = "/rs/cache/";
/// Prefix for the cache ordering index.
pub const CACHE_IDX: &str = "/rs/cache/idx/";

/// Nanosecond timestamp as a 20-digit key component.
#[must_use]
pub fn ts_nanos(ts: DateTime<Utc>) -> String {
    format!("{:020}", ts.timestamp_nanos_opt().unwrap_or_default().max(0))
}

/// `/rs/session/{id}`
#[must_use]
pub fn session(id: &str) -> Vec<u8> {
    format!("{SESSION}{id}").into_bytes()
}

/// `/rs/session/idx/client/{clientId}`
#[must_use]
pub fn idx_client(client_id: &str) -> Vec<u8> {
    format!("{IDX_CLIENT}{client_id}").into_bytes()
}

/// `/rs/session/idx/state/{state}/{id}`
#[must_use]
pub fn idx_state(state: SessionState, id: &str) -> Vec<u8> {
    format!("{IDX_STATE}{}/{id}", state.as_str()).into_bytes()
}

/// Prefix of one state's index.
#[must_use]
pub fn idx_state_prefix(state: SessionState) -> Vec<u8> {
    format!("{IDX_STATE}{}/", state.as_str()).into_bytes()
}

/// `/rs/cache/{sessionId}/{eventId}`
#[must_use]
pub fn cache(session_id: &str, event_id: &str) -> Vec<u8> {
    format!("{CACHE}{session_id}/{event_id}").into_bytes()
}

/// `/rs/cache/idx/{sessionId}/{ts20}/{eventId}`
#[must_use]
pub fn cache_idx(session_id: &str, ts: DateTime<Utc>, event_id: &str) -> Vec<u8> {
    format!("{CACHE_IDX}{session_id}/{}/{event_id}", ts_nanos(ts)).into_bytes()
}

/// Prefix of one session's cache index.
#[must_use]
pub fn cache_idx_prefix(session_id: &str) -> Vec<u8> {
    format!("{CACHE_IDX}{session_id}/").into_bytes()
}
