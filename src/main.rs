//! Pequod binary entry point — wires services, runs the poller and server.

use anyhow::Result;
use chrono::Duration as ChronoDuration;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use pequod::config::Config;
use pequod::modules::discovery::DiscoveryTable;
use pequod::modules::pipeline::PipelineDeps;
use pequod::modules::poller::Poller;
use pequod::modules::watchlist::Watchlist;
use pequod::server::{self, AppState};
use pequod::utils::alerts::AlertService;
use pequod::utils::allium::AlliumClient;
use pequod::utils::dedup::create_dedup_store;
use pequod::utils::geo::GeoMap;
use pequod::utils::identity::{IdentityClient, IdentityEntry};
use pequod::utils::labels::LabelRegistry;
use pequod::utils::logger::init_logger;
use pequod::utils::metrics::MetricsService;

const BANNER: &str = r#"
    ____                                __
   / __ \___  ____ ___  ______  ____   / /
  / /_/ / _ \/ __ `/ / / / __ \/ __ \ / /
 / ____/  __/ /_/ / /_/ / /_/ / /_/ //_/
/_/    \___/\__, /\__,_/\____/\____/(_)
              /_/        whale explorer
"#;

/// Fetch identity entities with a hard timeout. Failure or timeout degrades
/// to static labels only; startup never blocks on enrichment.
async fn fetch_identity(api_key: &str, timeout_secs: u64) -> Vec<IdentityEntry> {
    let identity = IdentityClient::new(api_key);
    match tokio::time::timeout(Duration::from_secs(timeout_secs), identity.fetch_entities()).await
    {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            warn!(target: "PEQUOD", "Identity fetch failed, using static labels only: {e:#}");
            Vec::new()
        }
        Err(_) => {
            warn!(
                target: "PEQUOD",
                "Identity fetch timed out after {}s, using static labels only",
                timeout_secs
            );
            Vec::new()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let config = Config::from_env();

    println!("{}", BANNER);
    info!(target: "PEQUOD", "Starting Pequod monitor...");

    // Watchlist, labels, and geo are fully built before anything is served.
    let watchlist = Arc::new(Watchlist::from_directory(Path::new(&config.watchlist_dir))?);
    info!(
        target: "PEQUOD",
        "Loaded {} watchlist addresses",
        watchlist.total_addresses()
    );

    let mut labels = LabelRegistry::new(Arc::clone(&watchlist));
    let mut geo = GeoMap::from_watchlist(&watchlist);

    if config.enable_identity_enrichment {
        if let Some(api_key) = config.allium_api_key.as_deref() {
            let entries = fetch_identity(api_key, config.identity_fetch_timeout_seconds).await;
            if !entries.is_empty() {
                labels.merge_identity(entries);
                geo.register_identity(&labels);
            }
        }
    } else {
        info!(target: "PEQUOD", "Identity enrichment disabled by config");
    }

    let client = config
        .allium_api_key
        .as_deref()
        .map(|key| Arc::new(AlliumClient::new(key, &config.allium_base_url)));
    if client.is_none() {
        warn!(
            target: "PEQUOD",
            "No Allium API key configured - running frontend-only, poller disabled"
        );
    }

    let metrics = Arc::new(MetricsService::new());
    metrics
        .watchlist_addresses
        .set(watchlist.total_addresses() as f64);

    let deps = Arc::new(PipelineDeps {
        client,
        labels: Arc::new(labels),
        geo: Arc::new(geo),
        dedup: create_dedup_store(config.redis_url.as_deref()).await,
        alerts: Arc::new(AlertService::new(&config)),
        discovery: Arc::new(DiscoveryTable::new()),
        metrics,
        threshold: config.min_usd_threshold,
        watchlist,
    });

    let poller = Arc::new(Poller::new(
        Arc::clone(&deps),
        Duration::from_secs(config.poll_interval_seconds),
        ChronoDuration::days(config.lookback_days),
    ));
    if deps.client.is_some() {
        poller.start();
    }

    let state = AppState::new(Arc::clone(&deps), Arc::clone(&poller));

    tokio::select! {
        result = server::serve(state, config.port) => {
            if let Err(e) = result {
                error!(target: "PEQUOD", "Server error: {:#}", e);
            }
        }
        _ = shutdown_signal() => {
            info!(target: "PEQUOD", "Shutting down...");
            poller.stop();
        }
    }

    info!(target: "PEQUOD", "Shutdown complete");
    Ok(())
}
