//! Prometheus metrics service for Pequod

use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::time::Instant;
use tracing::info;

/// Metrics service for Prometheus
pub struct MetricsService {
    registry: Registry,
    start_time: Instant,

    // Pipeline metrics
    pub alerts_sent: CounterVec,
    pub alert_volume_usd: CounterVec,
    pub alerts_deduped: Counter,

    // Poller metrics
    pub poll_cycles: Counter,
    pub batches_failed: Counter,

    // System metrics
    pub watchlist_addresses: Gauge,
    pub discovered_addresses: Gauge,
    pub uptime: Gauge,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new() -> Self {
        let registry = Registry::new();

        let alerts_sent = CounterVec::new(
            Opts::new("pequod_alerts_sent_total", "Whale alerts published"),
            &["type"],
        )
        .unwrap();
        let alert_volume_usd = CounterVec::new(
            Opts::new("pequod_alert_volume_usd_total", "USD volume of published alerts"),
            &["type"],
        )
        .unwrap();
        let alerts_deduped =
            Counter::new("pequod_alerts_deduped_total", "Alerts dropped as duplicates").unwrap();

        let poll_cycles =
            Counter::new("pequod_poll_cycles_total", "Completed polling cycles").unwrap();
        let batches_failed =
            Counter::new("pequod_batches_failed_total", "Address batches that failed").unwrap();

        let watchlist_addresses =
            Gauge::new("pequod_watchlist_addresses", "Watched addresses loaded").unwrap();
        let discovered_addresses =
            Gauge::new("pequod_discovered_addresses", "Discovered counterparties tracked")
                .unwrap();
        let uptime = Gauge::new("pequod_uptime_seconds", "Application uptime").unwrap();

        registry.register(Box::new(alerts_sent.clone())).unwrap();
        registry.register(Box::new(alert_volume_usd.clone())).unwrap();
        registry.register(Box::new(alerts_deduped.clone())).unwrap();
        registry.register(Box::new(poll_cycles.clone())).unwrap();
        registry.register(Box::new(batches_failed.clone())).unwrap();
        registry.register(Box::new(watchlist_addresses.clone())).unwrap();
        registry.register(Box::new(discovered_addresses.clone())).unwrap();
        registry.register(Box::new(uptime.clone())).unwrap();

        info!(target: "METRICS", "Prometheus metrics initialized");

        Self {
            registry,
            start_time: Instant::now(),
            alerts_sent,
            alert_volume_usd,
            alerts_deduped,
            poll_cycles,
            batches_failed,
            watchlist_addresses,
            discovered_addresses,
            uptime,
        }
    }

    /// Get metrics as Prometheus text format
    pub fn get_metrics(&self) -> String {
        self.uptime.set(self.start_time.elapsed().as_secs_f64());

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for MetricsService {
    fn default() -> Self {
        Self::new()
    }
}
