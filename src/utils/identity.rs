//! Allium identity enrichment — labeled entities from the Explorer SQL API.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

pub const EXPLORER_BASE_URL: &str = "https://api.allium.so/api/v1/explorer";

const DEFAULT_CHAINS: [&str; 5] = ["ethereum", "polygon", "arbitrum", "optimism", "base"];
const DEFAULT_CATEGORIES: [&str; 4] = ["cex", "dex", "bridge", "fund"];
const QUERY_LIMIT: u32 = 10_000;

/// A single labeled address from the identity tables.
#[derive(Debug, Clone)]
pub struct IdentityEntry {
    pub address: String,
    pub chain: String,
    pub label: String,
    pub project: String,
    pub category: String,
}

/// Runs Explorer SQL queries for labeled blockchain addresses.
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl IdentityClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: EXPLORER_BASE_URL.to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn run_query(&self, sql: &str) -> Result<Vec<serde_json::Value>> {
        let create: serde_json::Value = self
            .http
            .post(format!("{}/queries", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({
                "title": "pequod_identity",
                "config": {"sql": sql, "limit": QUERY_LIMIT},
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let query_id = create
            .get("query_id")
            .and_then(|v| v.as_str())
            .context("query creation response missing query_id")?;

        let run: serde_json::Value = self
            .http
            .post(format!("{}/queries/{}/run", self.base_url, query_id))
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({}))
            .timeout(Duration::from_secs(120))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(run
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// Fetch labeled entities (known CEXes, DEXes, bridges, funds) for the
    /// default EVM chains.
    pub async fn fetch_entities(&self) -> Result<Vec<IdentityEntry>> {
        let chain_list = DEFAULT_CHAINS
            .iter()
            .map(|c| format!("'{c}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let category_list = DEFAULT_CATEGORIES
            .iter()
            .map(|c| format!("'{c}'"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "SELECT address, chain, name, project, category \
             FROM common.identity.entities \
             WHERE chain IN ({chain_list}) \
               AND category IN ({category_list}) \
               AND address IS NOT NULL \
             LIMIT {QUERY_LIMIT}"
        );

        let rows = self.run_query(&sql).await?;

        let str_field = |row: &serde_json::Value, key: &str| -> String {
            row.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let mut entries = Vec::new();
        for row in rows {
            let address = str_field(&row, "address");
            if address.is_empty() {
                continue;
            }
            let name = str_field(&row, "name");
            let label = if name.is_empty() {
                str_field(&row, "label")
            } else {
                name
            };
            entries.push(IdentityEntry {
                address: address.to_lowercase(),
                chain: str_field(&row, "chain"),
                label,
                project: str_field(&row, "project"),
                category: str_field(&row, "category"),
            });
        }

        info!(target: "IDENTITY", "Fetched {} identity entities", entries.len());
        Ok(entries)
    }
}
