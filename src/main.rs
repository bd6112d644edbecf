//! arbcom daemon
//!
//! Hosts the motion engine over file-backed storage and, when configured,
//! the background change-feed monitor. The chat command layer in front of
//! the engine is a separate concern; this binary logs outbound
//! notifications and governance events instead of delivering them to a
//! chat platform.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use arbcom_core::{logging, BotConfig, Configuration, Storage};
use arbcom_core::storage::FileStorage;
use arbcom_governance::{
    notify::NullNotifier, settings::ElectorateSettings, CloseCoordinator, EventBus, MotionEngine,
    MotionRegistry, Notifier, VoteLedger,
};
use arbcom_monitor::{JsonLinesFeed, Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "arbcom.toml".to_string());
    let config = BotConfig::from_file(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    logging::init_logging(&config.log_level)?;
    info!("Starting arbcom daemon");

    let storage: Arc<dyn Storage> = Arc::new(
        FileStorage::new(&config.data_dir)
            .await
            .context("opening storage")?,
    );

    let registry = Arc::new(MotionRegistry::new(storage.clone()));
    let ledger = Arc::new(VoteLedger::new(storage.clone()));
    let settings = Arc::new(ElectorateSettings::new(storage.clone()));
    let events = EventBus::default();
    let notifier: Arc<dyn Notifier> = Arc::new(NullNotifier);

    let coordinator = Arc::new(CloseCoordinator::new(
        registry.clone(),
        ledger.clone(),
        notifier.clone(),
        events.clone(),
        config.archive_channel,
    ));
    let _engine = MotionEngine::new(
        registry,
        ledger,
        settings,
        coordinator,
        notifier.clone(),
        events.clone(),
        config.committee_channel,
        config.archive_channel,
    );

    // Surface governance events in the daemon log
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!("Governance event: {:?}", event);
        }
    });

    if config.monitor.enabled {
        let monitor_config = MonitorConfig {
            wiki: config.monitor.wiki.clone(),
            watched_titles: config.monitor.watched_titles.clone(),
            channel: config.committee_channel,
            ..MonitorConfig::default()
        };
        info!(
            "Starting change-feed monitor for {} watched pages",
            monitor_config.watched_titles.len()
        );
        // Feed lines arrive on stdin; the watcher reattaches after drops.
        let monitor = Monitor::start(monitor_config, notifier, JsonLinesFeed::stdin);
        monitor.join().await;
    } else {
        tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    }

    info!("Shutting down");
    Ok(())
}
