//! Allium REST API client (wallet transactions + token prices).

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{PricesResponse, TransactionsResponse, WalletTransaction};

pub const DEFAULT_BASE_URL: &str = "https://api.allium.so/api/v1/developer";

/// Upstream limit on addresses per transactions request.
pub const MAX_ADDRESSES_PER_BATCH: usize = 20;
/// Upstream limit on tokens per prices request.
pub const MAX_TOKENS_PER_BATCH: usize = 200;

const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
const INTER_PAGE_DELAY: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status} from {endpoint}")]
    Status {
        status: StatusCode,
        endpoint: &'static str,
    },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// One watched address, as the transactions endpoint expects it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct AddressRef {
    pub chain: String,
    pub address: String,
}

/// One token, as the prices endpoint expects it.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRef {
    pub token_address: String,
    pub chain: String,
}

/// Thin async wrapper around Allium's REST API.
pub struct AlliumClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlliumClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Fetch transactions for one batch of addresses (max 20 per request).
    ///
    /// 429 and 5xx responses are retried up to [`MAX_RETRIES`] extra times
    /// with exponential backoff, honoring a `Retry-After` hint when the
    /// upstream supplies one. Any other 4xx surfaces immediately. Items are
    /// re-filtered to the lookback window client-side; the upstream time
    /// filter is coarse and not trusted as exact.
    pub async fn fetch_transactions(
        &self,
        addresses: &[AddressRef],
        limit: usize,
        lookback: ChronoDuration,
        cursor: Option<&str>,
    ) -> Result<TransactionsResponse, ApiError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 0u32;

        let resp = loop {
            let mut req = self
                .http
                .post(format!("{}/wallet/transactions", self.base_url))
                .header("X-API-KEY", &self.api_key)
                .query(&[("limit", limit.to_string())]);
            if let Some(cursor) = cursor {
                req = req.query(&[("cursor", cursor)]);
            }
            let resp = req.json(&addresses).send().await?;
            let status = resp.status();

            if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                break resp;
            }
            if attempt >= MAX_RETRIES {
                return Err(ApiError::Status {
                    status,
                    endpoint: "/wallet/transactions",
                });
            }
            let wait = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(delay);
            attempt += 1;
            warn!(
                target: "ALLIUM",
                "HTTP {} from /wallet/transactions, retrying in {:.1}s (attempt {}/{})",
                status.as_u16(),
                wait.as_secs_f64(),
                attempt,
                MAX_RETRIES
            );
            tokio::time::sleep(wait).await;
            delay *= 2;
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                endpoint: "/wallet/transactions",
            });
        }

        let mut parsed: TransactionsResponse = resp.json().await?;
        let cutoff = Utc::now() - lookback;
        parsed.items.retain(|tx| tx.block_timestamp >= cutoff);
        Ok(parsed)
    }

    /// Follow cursor pagination until the upstream supplies no cursor,
    /// returns no items in the window, or `max_pages` is reached. The page
    /// cap bounds worst-case latency on misbehaving pagination.
    pub async fn fetch_transactions_paged(
        &self,
        addresses: &[AddressRef],
        limit: usize,
        lookback: ChronoDuration,
        max_pages: usize,
    ) -> Result<Vec<WalletTransaction>, ApiError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 0..max_pages {
            let resp = self
                .fetch_transactions(addresses, limit, lookback, cursor.as_deref())
                .await?;
            let page_empty = resp.items.is_empty();
            items.extend(resp.items);
            cursor = resp.cursor;
            if cursor.is_none() || page_empty {
                break;
            }
            debug!(target: "ALLIUM", "Following cursor to page {}", page + 2);
            tokio::time::sleep(INTER_PAGE_DELAY).await;
        }

        Ok(items)
    }

    /// Fetch latest prices for a batch of tokens (max 200 per request).
    /// Single attempt: a failed batch degrades valuation rather than
    /// aborting the cycle, so the caller handles the error locally.
    pub async fn fetch_prices(&self, tokens: &[TokenRef]) -> Result<PricesResponse, ApiError> {
        if tokens.is_empty() {
            return Ok(PricesResponse::default());
        }

        let resp = self
            .http
            .post(format!("{}/prices", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&tokens)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                endpoint: "/prices",
            });
        }
        Ok(resp.json().await?)
    }
}
