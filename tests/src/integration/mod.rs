//! # End-to-End Scenarios
//!
//! Cross-subsystem tests driven by the in-process local node.

pub mod fetch_scenarios;
pub mod index_queries;
pub mod notify_scenarios;
pub mod resume_scenarios;
