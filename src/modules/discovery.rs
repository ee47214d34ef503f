//! Non-watchlist counterparties observed in whale alerts.

use dashmap::DashMap;
use serde::Serialize;

use crate::models::WhaleAlert;
use crate::modules::watchlist::Watchlist;

/// Cap on tracked discovered addresses. The lowest-volume entries are
/// evicted once the table exceeds it.
const MAX_DISCOVERED: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredAddress {
    pub address: String,
    pub chain: String,
    pub label: Option<String>,
    pub total_usd: f64,
    pub count: u64,
}

/// Running table of counterparty addresses that are not in the watchlist,
/// accumulated for the map layer.
#[derive(Default)]
pub struct DiscoveryTable {
    entries: DashMap<String, DiscoveredAddress>,
}

impl DiscoveryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record both counterparties of a surviving alert, skipping anything
    /// the watchlist already knows. The first observed label sticks.
    pub fn track(&self, alert: &WhaleAlert, watchlist: &Watchlist) {
        let candidates = [
            (alert.from_address.as_deref(), alert.from_label.as_deref()),
            (alert.to_address.as_deref(), alert.to_label.as_deref()),
        ];
        for (address, label) in candidates {
            let Some(address) = address else {
                continue;
            };
            if watchlist.label_of(address, Some(&alert.chain)).is_some() {
                continue;
            }

            let key = address.to_lowercase();
            self.entries
                .entry(key)
                .and_modify(|entry| {
                    entry.total_usd += alert.usd_value;
                    entry.count += 1;
                    if entry.label.is_none() {
                        if let Some(label) = label {
                            entry.label = Some(label.to_string());
                        }
                    }
                })
                .or_insert_with(|| DiscoveredAddress {
                    address: address.to_string(),
                    chain: alert.chain.clone(),
                    label: label.map(str::to_string),
                    total_usd: alert.usd_value,
                    count: 1,
                });
        }

        self.evict_over_cap();
    }

    fn evict_over_cap(&self) {
        let over = self.entries.len().saturating_sub(MAX_DISCOVERED);
        if over == 0 {
            return;
        }
        let mut by_volume: Vec<(String, f64)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().total_usd))
            .collect();
        by_volume.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        for (key, _) in by_volume.into_iter().take(over) {
            self.entries.remove(&key);
        }
    }

    pub fn all(&self) -> Vec<DiscoveredAddress> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertType;
    use chrono::Utc;

    fn alert_from(address: &str, usd: f64) -> WhaleAlert {
        let mut alert = WhaleAlert::new("0xhash", "ethereum", Utc::now(), AlertType::Transfer);
        alert.from_address = Some(address.to_string());
        alert.usd_value = usd;
        alert
    }

    #[test]
    fn accumulates_volume_and_count_per_address() {
        let table = DiscoveryTable::new();
        let watchlist = Watchlist::default();

        table.track(&alert_from("0xabc", 1_000_000.0), &watchlist);
        table.track(&alert_from("0xABC", 2_000_000.0), &watchlist);

        let all = table.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].total_usd, 3_000_000.0);
        assert_eq!(all[0].count, 2);
    }

    #[test]
    fn cap_keeps_the_highest_volume_entries() {
        let table = DiscoveryTable::new();
        let watchlist = Watchlist::default();

        for i in 0..600u64 {
            // Later addresses carry more volume.
            table.track(
                &alert_from(&format!("0x{i:040x}"), 1_000_000.0 + i as f64),
                &watchlist,
            );
        }

        assert_eq!(table.len(), 500);
        let min_volume = table
            .all()
            .iter()
            .map(|e| e.total_usd)
            .fold(f64::INFINITY, f64::min);
        // The 100 lowest-volume entries (i < 100) were evicted.
        assert!(min_volume >= 1_000_000.0 + 100.0);
    }
}
