//! Alert distribution — recent-alert buffer, live broadcast, Telegram sink.

use anyhow::Result;
use parking_lot::RwLock;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::Config;
use crate::models::LocatedAlert;

/// Most recent alerts kept for REST queries, newest first.
const HISTORY_CAPACITY: usize = 1000;

/// Live broadcast capacity. Lagging subscribers lose the oldest frames
/// first; real-time viewers prefer recency over completeness.
const LIVE_CAPACITY: usize = 1000;

/// Fans completed alerts out to every sink: the in-memory ring buffer for
/// REST queries, the broadcast channel for WebSocket subscribers, and
/// (when configured) a Telegram channel.
pub struct AlertService {
    telegram: Option<TelegramSink>,
    history: RwLock<VecDeque<LocatedAlert>>,
    live_tx: broadcast::Sender<LocatedAlert>,
}

struct TelegramSink {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl AlertService {
    pub fn new(config: &Config) -> Self {
        let telegram = match (&config.telegram_bot_token, &config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => {
                info!(target: "ALERTS", "Telegram sink configured");
                Some(TelegramSink {
                    http: reqwest::Client::new(),
                    bot_token: token.clone(),
                    chat_id: chat_id.clone(),
                })
            }
            _ => {
                info!(target: "ALERTS", "Telegram not configured - alerts stay local");
                None
            }
        };

        let (live_tx, _) = broadcast::channel(LIVE_CAPACITY);

        Self {
            telegram,
            history: RwLock::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            live_tx,
        }
    }

    /// Subscribe to the live alert stream.
    pub fn subscribe(&self) -> broadcast::Receiver<LocatedAlert> {
        self.live_tx.subscribe()
    }

    /// Record an alert and fan it out. Telegram failures are logged and
    /// never propagated; the alert is already buffered and broadcast.
    pub async fn publish(&self, alert: LocatedAlert, telegram_text: &str) {
        {
            let mut history = self.history.write();
            history.push_front(alert.clone());
            history.truncate(HISTORY_CAPACITY);
        }

        let _ = self.live_tx.send(alert);

        if let Some(sink) = &self.telegram {
            if let Err(e) = sink.send(telegram_text).await {
                error!(target: "ALERTS", "Telegram send failed: {e:#}");
            }
        }
    }

    /// Most recent alerts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LocatedAlert> {
        self.history.read().iter().take(limit).cloned().collect()
    }

    /// First buffered alert with a matching transaction hash.
    pub fn find(&self, tx_hash: &str) -> Option<LocatedAlert> {
        self.history
            .read()
            .iter()
            .find(|a| a.alert.tx_hash == tx_hash)
            .cloned()
    }

    pub fn buffered(&self) -> usize {
        self.history.read().len()
    }
}

impl TelegramSink {
    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let params = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        self.http
            .post(&url)
            .json(&params)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
