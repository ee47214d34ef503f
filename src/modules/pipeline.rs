//! Per-batch processing: fetch -> enrich -> extract -> filter -> dedup -> publish.

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tracing::info;

use crate::models::{LocatedAlert, WalletTransaction, WhaleAlert};
use crate::modules::discovery::DiscoveryTable;
use crate::modules::enricher::{build_price_map, PriceMap};
use crate::modules::extractor::extract_alerts;
use crate::modules::watchlist::Watchlist;
use crate::utils::alerts::AlertService;
use crate::utils::allium::{AddressRef, AlliumClient};
use crate::utils::dedup::{make_dedup_key, DedupStore};
use crate::utils::format::format_alert;
use crate::utils::geo::GeoMap;
use crate::utils::labels::LabelRegistry;
use crate::utils::metrics::MetricsService;

/// Transactions requested per poll fetch.
const FETCH_LIMIT: usize = 100;

/// Everything a batch run needs. Built once in main and shared by the
/// poller and the on-demand history endpoint; no ambient singletons.
pub struct PipelineDeps {
    pub client: Option<Arc<AlliumClient>>,
    pub watchlist: Arc<Watchlist>,
    pub labels: Arc<LabelRegistry>,
    pub geo: Arc<GeoMap>,
    pub dedup: Arc<dyn DedupStore>,
    pub alerts: Arc<AlertService>,
    pub discovery: Arc<DiscoveryTable>,
    pub metrics: Arc<MetricsService>,
    pub threshold: f64,
}

/// Attach geo coordinates for both counterparties of an alert.
pub fn locate(alert: WhaleAlert, geo: &GeoMap) -> LocatedAlert {
    let from_geo = alert.from_address.as_deref().map(|a| geo.get(a));
    let to_geo = alert.to_address.as_deref().map(|a| geo.get(a));
    LocatedAlert {
        from_lat: from_geo.as_ref().map(|g| g.lat),
        from_lon: from_geo.as_ref().map(|g| g.lon),
        from_country: from_geo.map(|g| g.country),
        to_lat: to_geo.as_ref().map(|g| g.lat),
        to_lon: to_geo.as_ref().map(|g| g.lon),
        to_country: to_geo.map(|g| g.country),
        alert,
    }
}

/// Process a single batch of addresses. Returns the number of alerts sent.
pub async fn process_batch(
    deps: &PipelineDeps,
    batch: &[AddressRef],
    lookback: ChronoDuration,
) -> Result<usize> {
    let client = deps.client.as_ref().context("no upstream client configured")?;

    let resp = client
        .fetch_transactions(batch, FETCH_LIMIT, lookback, None)
        .await?;
    if resp.items.is_empty() {
        return Ok(0);
    }

    let price_map = build_price_map(client, &resp.items).await;
    dispatch_transactions(deps, &resp.items, &price_map).await
}

/// Extract, threshold-filter, dedup, and publish alerts for fetched
/// transactions. Returns the number of alerts published.
pub async fn dispatch_transactions(
    deps: &PipelineDeps,
    txs: &[WalletTransaction],
    price_map: &PriceMap,
) -> Result<usize> {
    let mut sent = 0;

    for tx in txs {
        for alert in extract_alerts(tx, price_map, &deps.labels) {
            if alert.usd_value < deps.threshold {
                continue;
            }

            let key = make_dedup_key(&alert.tx_hash, alert.alert_type, alert.asset_symbol.as_deref());
            if deps.dedup.is_seen(&key).await? {
                deps.metrics.alerts_deduped.inc();
                continue;
            }
            deps.dedup.mark_seen(&key).await?;

            deps.discovery.track(&alert, &deps.watchlist);
            deps.metrics.discovered_addresses.set(deps.discovery.len() as f64);

            let kind = alert.alert_type.as_str();
            deps.metrics.alerts_sent.with_label_values(&[kind]).inc();
            deps.metrics
                .alert_volume_usd
                .with_label_values(&[kind])
                .inc_by(alert.usd_value);

            info!(
                target: "PIPELINE",
                "Alert: {} {} {:.0} USD on {}",
                kind,
                alert.asset_symbol.as_deref().unwrap_or("?"),
                alert.usd_value,
                alert.chain
            );

            let message = format_alert(&alert);
            deps.alerts.publish(locate(alert, &deps.geo), &message).await;
            sent += 1;
        }
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::utils::dedup::{MemoryDedupStore, DEDUP_TTL};
    use serde_json::json;

    fn test_deps(threshold: f64) -> PipelineDeps {
        let config = Config {
            allium_api_key: None,
            allium_base_url: String::new(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            redis_url: None,
            poll_interval_seconds: 60,
            min_usd_threshold: threshold,
            lookback_days: 1,
            enable_identity_enrichment: false,
            identity_fetch_timeout_seconds: 30,
            port: 8000,
            watchlist_dir: String::new(),
        };
        let watchlist = Arc::new(Watchlist::default());
        PipelineDeps {
            client: None,
            labels: Arc::new(LabelRegistry::new(Arc::clone(&watchlist))),
            geo: Arc::new(GeoMap::from_watchlist(&watchlist)),
            watchlist,
            dedup: Arc::new(MemoryDedupStore::new(DEDUP_TTL)),
            alerts: Arc::new(AlertService::new(&config)),
            discovery: Arc::new(DiscoveryTable::new()),
            metrics: Arc::new(MetricsService::new()),
            threshold,
        }
    }

    fn usdc_tx(hash: &str, amount: f64) -> WalletTransaction {
        serde_json::from_value(json!({
            "id": format!("tx-{hash}"),
            "address": "0xwatched",
            "chain": "ethereum",
            "hash": hash,
            "index": 0,
            "block_timestamp": "2026-01-01T00:00:00Z",
            "block_number": 100,
            "asset_transfers": [{
                "transfer_type": "sent",
                "transaction_hash": hash,
                "from_address": "0xfrom",
                "to_address": "0xto",
                "asset": {
                    "type": "evm_erc20",
                    "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                    "symbol": "USDC"
                },
                "amount": {"amount": amount}
            }]
        }))
        .unwrap()
    }

    fn usdc_prices() -> PriceMap {
        let mut map = PriceMap::new();
        map.insert(
            (
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
                "ethereum".to_string(),
            ),
            1.0,
        );
        map
    }

    #[tokio::test]
    async fn below_threshold_alerts_reach_no_output_channel() {
        let deps = test_deps(1_000_000.0);
        let mut rx = deps.alerts.subscribe();

        let sent = dispatch_transactions(&deps, &[usdc_tx("0xsmall", 200_000.0)], &usdc_prices())
            .await
            .unwrap();

        assert_eq!(sent, 0);
        assert!(deps.alerts.recent(10).is_empty());
        assert!(rx.try_recv().is_err());
        assert!(deps.discovery.is_empty());
    }

    #[tokio::test]
    async fn surviving_alert_is_buffered_broadcast_and_located() {
        let deps = test_deps(1_000_000.0);
        let mut rx = deps.alerts.subscribe();

        let sent = dispatch_transactions(&deps, &[usdc_tx("0xbig", 2_000_000.0)], &usdc_prices())
            .await
            .unwrap();

        assert_eq!(sent, 1);
        let buffered = deps.alerts.recent(10);
        assert_eq!(buffered.len(), 1);
        assert!(buffered[0].from_lat.is_some());
        assert!(buffered[0].to_lat.is_some());

        let live = rx.try_recv().unwrap();
        assert_eq!(live.alert.tx_hash, "0xbig");

        // Both non-watchlist counterparties were discovered.
        assert_eq!(deps.discovery.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_alerts_are_dropped_silently() {
        let deps = test_deps(1_000_000.0);
        let tx = usdc_tx("0xdup", 3_000_000.0);

        let first = dispatch_transactions(&deps, &[tx.clone()], &usdc_prices())
            .await
            .unwrap();
        let second = dispatch_transactions(&deps, &[tx], &usdc_prices())
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert_eq!(deps.alerts.buffered(), 1);
    }
}
