//! # Runtime Configuration
//!
//! One JSON file covering every subsystem, with defaults that run against
//! a local node. The node endpoint can be overridden with the
//! `CHAINSENTRY_NODE_ENDPOINT` environment variable.

use cs_06_fetcher::FetcherConfig;
use cs_07_notifier::NotifierConfig;
use cs_08_resume::ResumeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SMTP settings for the email handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSettings {
    /// SMTP server host.
    pub smtp_host: String,
    /// SMTP server port.
    pub smtp_port: u16,
    /// PLAIN auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// PLAIN auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender mailbox.
    #[serde(default)]
    pub from: Option<String>,
    /// Dial TLS.
    #[serde(default)]
    pub use_tls: bool,
    /// Maximum To + Cc recipients.
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
    /// Deliveries allowed per minute.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

fn default_max_recipients() -> usize {
    10
}

fn default_rate_limit() -> u32 {
    30
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// JSON-RPC endpoint of the node to follow.
    pub node_endpoint: String,
    /// RocksDB data directory.
    pub data_dir: String,
    /// Node-detection probe timeout in milliseconds.
    pub detect_timeout_ms: u64,
    /// Graceful-shutdown deadline in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Webhook host allow-list; empty allows everything.
    pub webhook_allowed_hosts: Vec<String>,
    /// Email channel settings; the handler is skipped when absent.
    pub email: Option<EmailSettings>,
    /// Fetch pipeline settings.
    pub fetcher: FetcherConfig,
    /// Notifier settings.
    pub notifier: NotifierConfig,
    /// Resume delivery settings.
    pub resume: ResumeConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            node_endpoint: "http://127.0.0.1:8545".to_string(),
            data_dir: "./data/chainsentry".to_string(),
            detect_timeout_ms: 5_000,
            shutdown_grace_ms: 10_000,
            webhook_allowed_hosts: Vec::new(),
            email: None,
            fetcher: FetcherConfig::default(),
            notifier: NotifierConfig::default(),
            resume: ResumeConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Load from an optional JSON file, then apply env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };

        if let Ok(endpoint) = std::env::var("CHAINSENTRY_NODE_ENDPOINT") {
            config.node_endpoint = endpoint;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::default();
        assert_eq!(config.node_endpoint, "http://127.0.0.1:8545");
        assert!(config.email.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let raw = r#"{ "node_endpoint": "http://10.0.0.1:8545", "fetcher": { "start_height": 5, "batch_size": 50, "workers": 0, "max_retries": 3, "retry_delay": 100, "poll_interval": 1000, "large_block_gas": 1000000, "large_block_receipts": 100 } }"#;
        let config: IndexerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.node_endpoint, "http://10.0.0.1:8545");
        assert_eq!(config.fetcher.start_height, 5);
        assert_eq!(config.shutdown_grace_ms, 10_000);
    }
}
