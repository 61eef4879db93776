//! sitewatch binary: loads configuration, starts monitoring and serves the
//! reporting API until Ctrl-C.

use sitewatch::config::{self, MonitorConfig};
use sitewatch::metrics::{default_windows, StatsStore};
use sitewatch::probe::HttpProbe;
use sitewatch::scheduler::{Reporter, Scheduler};
use sitewatch::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = MonitorConfig::load();
    tracing::info!("Starting sitewatch on port {}...", cfg.http_port);
    tracing::info!("Loading targets from {}", cfg.targets_path);

    let targets = config::load_targets(&cfg.targets_path)?;
    if targets.is_empty() {
        tracing::warn!("No targets configured in {}", cfg.targets_path);
    }

    let store = Arc::new(StatsStore::new(default_windows(), cfg.alert_threshold));
    let probe = HttpProbe::new(cfg.probe_timeout)?;

    // Start scheduler
    let scheduler = Scheduler::new(store.clone(), probe);
    let started = scheduler.start_monitoring(targets.clone());
    tracing::info!("Monitoring {} of {} targets", started, targets.len());

    let reporter = Reporter::new(
        store.clone(),
        targets,
        cfg.report_interval,
        cfg.summary_interval,
        scheduler.stop_signal(),
    )
    .start();

    // Serve the reporting API until Ctrl-C
    let server = Server::new(cfg.http_port, store);
    server.start(shutdown_signal()).await?;

    scheduler.shutdown().await;
    reporter.await?;
    tracing::info!("Stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
