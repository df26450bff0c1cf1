//! # Shared Bus - Event Bus for Inter-Subsystem Communication
//!
//! In-process publish/subscribe of typed indexer events.
//!
//! ## Contract
//!
//! - Publish is **non-blocking**: each subscriber owns a bounded queue and a
//!   full queue drops the event for that subscriber. The publisher learns of
//!   drops through the aggregate `accepted` flag and carries on.
//! - Subscribers see events in publisher-submitted order per publisher;
//!   cross-publisher order is not guaranteed.
//! - Unsubscribe is idempotent and safe under concurrent publish; dropping a
//!   [`Subscription`] unsubscribes automatically.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Fetcher    │                    │  Notifier /  │
//! │              │    publish()       │   Resume     │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod events;

pub use bus::{EventBus, Subscription};
pub use events::{
    BlockPayload, ChainEvent, ConsensusBlockPayload, ConsensusErrorKind, ConsensusErrorPayload,
    EventFilter, EventKind, LogPayload, TransactionPayload, ValidatorChange, ValidatorSetPayload,
};

/// Default events to buffer per subscriber before drops begin.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer() {
        assert_eq!(DEFAULT_SUBSCRIBER_BUFFER, 1000);
    }
}
