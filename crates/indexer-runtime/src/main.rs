//! # ChainSentry Runtime
//!
//! The indexer binary: opens storage, detects the connected node, wires
//! the event bus between the fetch pipeline and the notification and
//! resume subsystems, and follows the chain until ctrl-c.

mod config;

use anyhow::Result;
use config::IndexerConfig;
use cs_01_node_client::HttpNodeClient;
use cs_02_kv_store::{KvStore, RocksDbStore};
use cs_03_chain_index::{ChainIndex, ChainStore};
use cs_05_chain_adapter::detect;
use cs_06_fetcher::FetcherBuilder;
use cs_07_notifier::{
    EmailConfig, EmailHandler, NotificationHandler, NotifierService, NotifierStore, SlackConfig,
    SlackHandler, WebhookConfig, WebhookHandler,
};
use cs_08_resume::{ConnectionManager, EventCache, ResumeConfig, SessionStore};
use shared_bus::{EventBus, EventFilter, EventKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn build_handlers(config: &IndexerConfig) -> Result<Vec<Arc<dyn NotificationHandler>>> {
    let webhook = WebhookHandler::new(WebhookConfig {
        allowed_hosts: config.webhook_allowed_hosts.clone(),
        ..WebhookConfig::default()
    })?;
    let slack = SlackHandler::new(SlackConfig::default())?;

    let mut handlers: Vec<Arc<dyn NotificationHandler>> =
        vec![Arc::new(webhook), Arc::new(slack)];

    if let Some(email) = &config.email {
        handlers.push(Arc::new(EmailHandler::new(EmailConfig {
            smtp_host: email.smtp_host.clone(),
            smtp_port: email.smtp_port,
            username: email.username.clone(),
            password: email.password.clone(),
            from: email.from.clone(),
            use_tls: email.use_tls,
            max_recipients: email.max_recipients,
            rate_limit_per_minute: email.rate_limit_per_minute,
        })));
    }
    Ok(handlers)
}

fn spawn_resume_bridge(
    bus: &EventBus,
    manager: Arc<ConnectionManager>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut subscription = bus.subscribe(
        "resume-bridge",
        [
            EventKind::Block,
            EventKind::Transaction,
            EventKind::Log,
            EventKind::ConsensusBlock,
            EventKind::ConsensusError,
            EventKind::ValidatorSet,
        ],
        EventFilter::all(),
        1024,
    );

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                maybe = subscription.recv() => {
                    let Some(event) = maybe else { break };
                    manager.broadcast_event(event.kind().as_str(), &event.payload_json());
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = IndexerConfig::load(config_path.as_deref())?;

    info!(endpoint = %config.node_endpoint, data_dir = %config.data_dir, "ChainSentry starting");

    let kv: Arc<dyn KvStore> = Arc::new(RocksDbStore::open_default(&config.data_dir)?);
    let client = Arc::new(HttpNodeClient::new(config.node_endpoint.clone())?);

    let adapter = detect(&*client, Duration::from_millis(config.detect_timeout_ms)).await?;
    info!(
        chain = %adapter.info().name,
        chain_id = adapter.info().chain_id,
        "Adapter selected"
    );

    let bus = EventBus::new();
    let cancel = CancellationToken::new();

    // Fetch pipeline with every storage capability the index implements.
    let chain_store = ChainStore::new(kv.clone());
    let chain_index = Arc::new(ChainIndex::new(kv.clone()));
    let fetcher = FetcherBuilder::new(client, chain_store, bus.clone())
        .config(config.fetcher.clone())
        .adapter(adapter)
        .log_index(chain_index.clone())
        .address_index(chain_index.clone())
        .balances(chain_index.clone())
        .wbft(chain_index.clone())
        .fee_delegation_writer(chain_index)
        .cancel_token(cancel.clone())
        .build();

    // Notification subsystem.
    let notifier = NotifierService::new(
        NotifierStore::new(kv.clone()),
        bus.clone(),
        config.notifier.clone(),
        build_handlers(&config)?,
    );
    notifier.start()?;

    // Resume delivery subsystem and the bus bridge feeding it.
    let resume_config: ResumeConfig = config.resume.clone();
    let manager = ConnectionManager::new(
        SessionStore::new(kv.clone()),
        EventCache::new(kv),
        resume_config,
    );
    let cleanup = manager.start_cleanup_task();
    let bridge = spawn_resume_bridge(&bus, manager.clone(), cancel.clone());

    // Pending transactions, when the client exposes the capability.
    let pending = fetcher.start_pending_tx_subscription();

    let pipeline = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.run_with_gap_recovery().await })
    };

    info!("ChainSentry running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    cancel.cancel();
    manager.cancel_token().cancel();
    notifier
        .stop(Duration::from_millis(config.shutdown_grace_ms))
        .await;

    if let Some(pending) = pending {
        let _ = pending.await;
    }
    let _ = bridge.await;
    let _ = cleanup.await;

    match pipeline.await {
        Ok(Err(cs_06_fetcher::FetchError::Cancelled)) | Ok(Ok(())) => {}
        Ok(Err(err)) => error!(error = %err, "Pipeline exited with error"),
        Err(join_err) => error!(error = %join_err, "Pipeline task panicked"),
    }

    let stats = fetcher.stats();
    info!(
        blocks = stats.blocks_indexed,
        receipts = stats.receipts_stored,
        events = stats.events_published,
        "Shutdown complete"
    );
    Ok(())
}
