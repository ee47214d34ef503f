//! HTTP API and WebSocket server for the Pequod frontend.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Duration as ChronoDuration;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::models::LocatedAlert;
use crate::modules::enricher::build_price_map;
use crate::modules::extractor::extract_alerts;
use crate::modules::pipeline::{locate, PipelineDeps};
use crate::modules::poller::{Poller, PollerStats};
use crate::utils::allium::MAX_ADDRESSES_PER_BATCH;
use crate::utils::dedup::make_dedup_key;
use crate::utils::format::shorten_address;

/// History responses are cached per lookback window for this long.
const HISTORY_CACHE_TTL: Duration = Duration::from_secs(60);
/// Cursor-following depth per address batch for history fetches; bounds
/// worst-case latency on misbehaving pagination.
const MAX_HISTORY_PAGES: usize = 5;
/// Simultaneous in-flight batch fetches for history queries.
const HISTORY_CONCURRENCY: usize = 4;
/// Transactions requested per history page (the upstream max).
const HISTORY_FETCH_LIMIT: usize = 1000;

struct CachedHistory {
    alerts: Vec<LocatedAlert>,
    fetched_at: Instant,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    deps: Arc<PipelineDeps>,
    poller: Arc<Poller>,
    history_cache: Arc<RwLock<HashMap<i64, CachedHistory>>>,
    start_time: Instant,
}

impl AppState {
    pub fn new(deps: Arc<PipelineDeps>, poller: Arc<Poller>) -> Self {
        Self {
            deps,
            poller,
            history_cache: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
        }
    }

    fn cached_history(&self, window: i64) -> Option<Vec<LocatedAlert>> {
        let cache = self.history_cache.read();
        cache
            .get(&window)
            .filter(|entry| entry.fetched_at.elapsed() < HISTORY_CACHE_TTL)
            .map(|entry| entry.alerts.clone())
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/map", get(get_map))
        .route("/api/whales", get(get_whales))
        .route("/api/whale/:tx_hash", get(get_whale))
        .route("/api/whales/history", get(get_history))
        .route("/api/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .route("/health", get(health_check))
        .route("/api/ws/alerts", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process shuts down.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(target: "SERVER", "API listening on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================
// MAP LAYER
// ============================================

#[derive(Debug, Serialize)]
struct MapAddress {
    address: String,
    chain: String,
}

#[derive(Debug, Serialize)]
struct MapEntity {
    label: String,
    addresses: Vec<MapAddress>,
    lat: f64,
    lon: f64,
    country: String,
    discovered: bool,
}

#[derive(Debug, Serialize)]
struct MapResponse {
    entities: Vec<MapEntity>,
}

/// All watchlist entities grouped by label into islands, plus discovered
/// counterparties from whale alerts.
async fn get_map(State(state): State<AppState>) -> Json<MapResponse> {
    let deps = &state.deps;
    let mut entities: Vec<MapEntity> = Vec::new();
    let mut by_label: HashMap<String, usize> = HashMap::new();

    for entry in deps.watchlist.all_entries() {
        let label = deps
            .labels
            .label_of(&entry.address, Some(&entry.chain))
            .unwrap_or_else(|| entry.address.chars().take(10).collect());
        match by_label.get(&label).copied() {
            Some(i) => entities[i].addresses.push(MapAddress {
                address: entry.address,
                chain: entry.chain,
            }),
            None => {
                let geo = deps.geo.get(&entry.address);
                by_label.insert(label.clone(), entities.len());
                entities.push(MapEntity {
                    label,
                    addresses: vec![MapAddress {
                        address: entry.address,
                        chain: entry.chain,
                    }],
                    lat: geo.lat,
                    lon: geo.lon,
                    country: geo.country,
                    discovered: false,
                });
            }
        }
    }

    for info in deps.discovery.all() {
        let label = info
            .label
            .clone()
            .unwrap_or_else(|| shorten_address(&info.address));
        if by_label.contains_key(&label) {
            continue;
        }
        let geo = deps.geo.get(&info.address);
        by_label.insert(label.clone(), entities.len());
        entities.push(MapEntity {
            label,
            addresses: vec![MapAddress {
                address: info.address,
                chain: info.chain,
            }],
            lat: geo.lat,
            lon: geo.lon,
            country: geo.country,
            discovered: true,
        });
    }

    Json(MapResponse { entities })
}

// ============================================
// ALERT QUERIES
// ============================================

#[derive(Debug, Deserialize)]
struct WhalesParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct WhalesResponse {
    alerts: Vec<LocatedAlert>,
    total: usize,
}

async fn get_whales(
    State(state): State<AppState>,
    Query(params): Query<WhalesParams>,
) -> Json<WhalesResponse> {
    let limit = params.limit.unwrap_or(100);
    Json(WhalesResponse {
        alerts: state.deps.alerts.recent(limit),
        total: state.deps.alerts.buffered(),
    })
}

#[derive(Debug, Serialize)]
struct WhaleResponse {
    alert: Option<LocatedAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn get_whale(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Json<WhaleResponse> {
    match state.deps.alerts.find(&tx_hash) {
        Some(alert) => Json(WhaleResponse {
            alert: Some(alert),
            error: None,
        }),
        None => Json(WhaleResponse {
            alert: None,
            error: Some("Not found".to_string()),
        }),
    }
}

// ============================================
// HISTORY
// ============================================

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub lookback_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub alerts: Vec<LocatedAlert>,
    pub total: usize,
    pub cached: bool,
    pub lookback_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// On-demand historical whale alerts for an arbitrary lookback window.
///
/// Degraded states (no client, unreachable upstream) return an empty
/// result with an explicit error field, never an HTTP failure, so the
/// frontend can render something rather than nothing.
async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let lookback_minutes = params.lookback_minutes.unwrap_or(60).clamp(5, 1440);

    if let Some(alerts) = state.cached_history(lookback_minutes) {
        return Json(HistoryResponse {
            total: alerts.len(),
            alerts,
            cached: true,
            lookback_minutes,
            error: None,
        });
    }

    let Some(client) = state.deps.client.clone() else {
        return Json(HistoryResponse {
            alerts: Vec::new(),
            total: 0,
            cached: false,
            lookback_minutes,
            error: Some("upstream client not configured".to_string()),
        });
    };

    let lookback = ChronoDuration::minutes(lookback_minutes);
    let batches = state
        .deps
        .watchlist
        .batches(MAX_ADDRESSES_PER_BATCH, &["bitcoin"]);

    let results = futures_util::stream::iter(batches.into_iter().map(|batch| {
        let client = Arc::clone(&client);
        async move {
            client
                .fetch_transactions_paged(&batch, HISTORY_FETCH_LIMIT, lookback, MAX_HISTORY_PAGES)
                .await
        }
    }))
    .buffer_unordered(HISTORY_CONCURRENCY)
    .collect::<Vec<_>>()
    .await;

    let mut txs = Vec::new();
    let mut fetch_error: Option<String> = None;
    for result in results {
        match result {
            Ok(items) => txs.extend(items),
            Err(e) => {
                warn!(target: "SERVER", "History fetch failed for a batch: {}", e);
                fetch_error = Some(e.to_string());
            }
        }
    }

    if txs.is_empty() && fetch_error.is_some() {
        return Json(HistoryResponse {
            alerts: Vec::new(),
            total: 0,
            cached: false,
            lookback_minutes,
            error: fetch_error,
        });
    }

    let price_map = build_price_map(&client, &txs).await;

    let mut seen: HashSet<String> = HashSet::new();
    let mut alerts: Vec<LocatedAlert> = Vec::new();
    for tx in &txs {
        for alert in extract_alerts(tx, &price_map, &state.deps.labels) {
            if alert.usd_value < state.deps.threshold {
                continue;
            }
            let key =
                make_dedup_key(&alert.tx_hash, alert.alert_type, alert.asset_symbol.as_deref());
            if !seen.insert(key) {
                continue;
            }
            alerts.push(locate(alert, &state.deps.geo));
        }
    }
    alerts.sort_by(|a, b| b.alert.block_timestamp.cmp(&a.alert.block_timestamp));

    state.history_cache.write().insert(
        lookback_minutes,
        CachedHistory {
            alerts: alerts.clone(),
            fetched_at: Instant::now(),
        },
    );

    Json(HistoryResponse {
        total: alerts.len(),
        alerts,
        cached: false,
        lookback_minutes,
        error: fetch_error,
    })
}

// ============================================
// STATS / METRICS / HEALTH
// ============================================

#[derive(Debug, Serialize)]
struct StatsResponse {
    poller: PollerStats,
    buffered_alerts: usize,
    discovered_addresses: usize,
    watchlist_addresses: usize,
    identity_labels: usize,
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        poller: state.poller.get_stats(),
        buffered_alerts: state.deps.alerts.buffered(),
        discovered_addresses: state.deps.discovery.len(),
        watchlist_addresses: state.deps.watchlist.total_addresses(),
        identity_labels: state.deps.labels.identity_count(),
    })
}

async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.deps.metrics.get_metrics(),
    )
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime: f64,
    poller_running: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime: state.start_time.elapsed().as_secs_f64(),
        poller_running: state.poller.is_running(),
    })
}

// ============================================
// WEBSOCKET
// ============================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
enum WsFrame {
    #[serde(rename = "init")]
    Init { recent_alerts: Vec<LocatedAlert> },
    #[serde(rename = "alert")]
    Alert(LocatedAlert),
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    info!(target: "SERVER", "WebSocket client connected");

    let init = WsFrame::Init {
        recent_alerts: state.deps.alerts.recent(20),
    };
    if let Ok(json) = serde_json::to_string(&init) {
        let _ = sender.send(Message::Text(json)).await;
    }

    let mut alert_rx = state.deps.alerts.subscribe();

    // Forward live alerts to the socket
    let send_task = tokio::spawn(async move {
        loop {
            match alert_rx.recv().await {
                Ok(alert) => {
                    let frame = WsFrame::Alert(alert);
                    if let Ok(json) = serde_json::to_string(&frame) {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Slow consumers skip the oldest frames; recency wins.
                    warn!(target: "SERVER", "WebSocket client lagged {} alerts", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Drain incoming messages, mainly to notice the close frame
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(target: "SERVER", "WebSocket client disconnected");
}
