//! # Resume Delivery (Subsystem 8)
//!
//! The session-aware outbound layer. Every outbound event is cached
//! per-session *before* any live send, so a client that reconnects with
//! its last-seen event id replays exactly what it missed, in timestamp
//! order, bracketed by `replay_start` / `replay_end` messages.
//!
//! Sends are non-blocking over each session's bounded channel; a full
//! channel leaves the event in the cache for later replay. Sessions
//! expire by TTL on a background sweep.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod error;
pub mod event_cache;
pub mod keys;
pub mod manager;
pub mod session_store;

pub use domain::{
    CachedEvent, MessageMeta, OutboundMessage, ReconnectRequest, Session, SessionState,
    TopicSubscription,
};
pub use error::ResumeError;
pub use event_cache::EventCache;
pub use manager::{ConnectionManager, ResumeConfig};
pub use session_store::SessionStore;
