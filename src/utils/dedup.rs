//! Deduplication stores — Redis-backed or in-memory fallback.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::models::AlertType;

/// Alert keys are remembered for 48 hours before they may fire again.
pub const DEDUP_TTL: Duration = Duration::from_secs(48 * 60 * 60);

const REDIS_SET_KEY: &str = "pequod:dedup";

/// Capability contract for dedup backends. The pipeline is backend-agnostic;
/// selection happens once at startup.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn is_seen(&self, key: &str) -> Result<bool>;
    async fn mark_seen(&self, key: &str) -> Result<()>;
}

/// HashMap-backed store; expired entries are evicted lazily on lookup, so
/// there is no background sweep to manage.
pub struct MemoryDedupStore {
    entries: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl MemoryDedupStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn is_seen(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.retain(|_, seen_at| now.duration_since(*seen_at) <= self.ttl);
        Ok(entries.contains_key(key))
    }

    async fn mark_seen(&self, key: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), Instant::now());
        Ok(())
    }
}

/// Redis SET-based store shared across processes.
pub struct RedisDedupStore {
    conn: redis::aio::MultiplexedConnection,
    ttl_secs: i64,
}

impl RedisDedupStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            ttl_secs: DEDUP_TTL.as_secs() as i64,
        })
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn is_seen(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(REDIS_SET_KEY, key).await?)
    }

    async fn mark_seen(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(REDIS_SET_KEY, key).await?;
        // SETs have no per-member TTL, so the expiry applies to the whole
        // set and is refreshed on every insert. Under continuous traffic
        // entries can outlive the nominal 48h window. Accepted trade-off.
        let _: () = conn.expire(REDIS_SET_KEY, self.ttl_secs).await?;
        Ok(())
    }
}

/// Build a dedup key: `{tx_hash}:{alert_type}:{asset_symbol}`.
pub fn make_dedup_key(tx_hash: &str, alert_type: AlertType, asset_symbol: Option<&str>) -> String {
    format!(
        "{}:{}:{}",
        tx_hash,
        alert_type.as_str(),
        asset_symbol.unwrap_or("unknown")
    )
}

/// Factory: pick the backend based on configuration.
pub async fn create_dedup_store(redis_url: Option<&str>) -> Arc<dyn DedupStore> {
    match redis_url {
        Some(url) => match RedisDedupStore::connect(url).await {
            Ok(store) => {
                info!(target: "DEDUP", "Using Redis dedup store");
                Arc::new(store)
            }
            Err(e) => {
                warn!(target: "DEDUP", "Redis unavailable ({e:#}), falling back to in-memory store");
                Arc::new(MemoryDedupStore::new(DEDUP_TTL))
            }
        },
        None => {
            info!(target: "DEDUP", "Using in-memory dedup store (no Redis configured)");
            Arc::new(MemoryDedupStore::new(DEDUP_TTL))
        }
    }
}
