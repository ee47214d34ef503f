//! Configuration loaded from PEQUOD_* environment variables.

use std::env;

use crate::utils::allium::DEFAULT_BASE_URL;

/// Application configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Upstream API. Without a key the server runs frontend-only: the poller
    // stays off and history queries degrade to an explicit error field.
    pub allium_api_key: Option<String>,
    pub allium_base_url: String,

    // Telegram alerts (optional - absence disables that sink only)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Shared dedup backend (optional - in-process fallback otherwise)
    pub redis_url: Option<String>,

    // Pipeline tunables
    pub poll_interval_seconds: u64,
    pub min_usd_threshold: f64,
    pub lookback_days: i64,

    // Identity enrichment
    pub enable_identity_enrichment: bool,
    pub identity_fetch_timeout_seconds: u64,

    // Server
    pub port: u16,

    // Watchlist data directory
    pub watchlist_dir: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            allium_api_key: env::var("PEQUOD_ALLIUM_API_KEY").ok(),
            allium_base_url: env::var("PEQUOD_ALLIUM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),

            telegram_bot_token: env::var("PEQUOD_TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: env::var("PEQUOD_TELEGRAM_CHAT_ID").ok(),

            redis_url: env::var("PEQUOD_REDIS_URL").ok(),

            poll_interval_seconds: env::var("PEQUOD_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            min_usd_threshold: env::var("PEQUOD_MIN_USD_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000_000.0),
            lookback_days: env::var("PEQUOD_LOOKBACK_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),

            enable_identity_enrichment: env::var("PEQUOD_ENABLE_IDENTITY_ENRICHMENT")
                .map(|v| v != "false")
                .unwrap_or(true),
            identity_fetch_timeout_seconds: env::var("PEQUOD_IDENTITY_FETCH_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            port: env::var("PEQUOD_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),

            watchlist_dir: env::var("PEQUOD_WATCHLIST_DIR")
                .unwrap_or_else(|_| "data/watchlist".to_string()),
        }
    }
}
