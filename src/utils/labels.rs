//! Ordered label sources — static watchlist first, identity data second.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::modules::watchlist::Watchlist;
use crate::utils::identity::IdentityEntry;

#[derive(Debug, Clone)]
struct IdentityRecord {
    label: String,
    project: String,
    category: String,
}

/// Merged label lookup. Sources are consulted in priority order and the
/// first hit wins: the static watchlist, then merged identity rows.
pub struct LabelRegistry {
    watchlist: Arc<Watchlist>,
    // chain -> lowercased address -> record
    identity: HashMap<String, HashMap<String, IdentityRecord>>,
    identity_count: usize,
}

impl LabelRegistry {
    pub fn new(watchlist: Arc<Watchlist>) -> Self {
        Self {
            watchlist,
            identity: HashMap::new(),
            identity_count: 0,
        }
    }

    /// Merge identity entries, skipping addresses the static watchlist
    /// already labels (the watchlist always outranks identity data).
    pub fn merge_identity(&mut self, entries: Vec<IdentityEntry>) {
        let mut merged = 0;
        for entry in entries {
            if self
                .watchlist
                .label_of(&entry.address, Some(&entry.chain))
                .is_some()
            {
                continue;
            }
            let chain_map = self.identity.entry(entry.chain).or_default();
            let key = entry.address.to_lowercase();
            if !chain_map.contains_key(&key) {
                chain_map.insert(
                    key,
                    IdentityRecord {
                        label: entry.label,
                        project: entry.project,
                        category: entry.category,
                    },
                );
                merged += 1;
            }
        }
        self.identity_count = merged;
        info!(target: "LABELS", "Merged {} identity labels", merged);
    }

    fn identity_record(&self, address: &str, chain: Option<&str>) -> Option<&IdentityRecord> {
        let key = address.to_lowercase();
        match chain {
            Some(chain) => self.identity.get(chain)?.get(&key),
            None => self.identity.values().find_map(|m| m.get(&key)),
        }
    }

    /// Resolve a label for an address. Returns None when no source knows it.
    pub fn label_of(&self, address: &str, chain: Option<&str>) -> Option<String> {
        if let Some(label) = self.watchlist.label_of(address, chain) {
            return Some(label.to_string());
        }
        let record = self.identity_record(address, chain)?;
        if !record.label.is_empty() {
            Some(record.label.clone())
        } else if !record.project.is_empty() {
            Some(record.project.clone())
        } else {
            None
        }
    }

    /// Raw identity category (cex, dex, bridge, fund, ...) for geo mapping.
    pub fn identity_category(&self, address: &str, chain: Option<&str>) -> Option<String> {
        let record = self.identity_record(address, chain)?;
        if record.category.is_empty() {
            None
        } else {
            Some(record.category.clone())
        }
    }

    /// All identity (address, chain) pairs not in the static watchlist.
    pub fn identity_addresses(&self) -> Vec<(String, String)> {
        self.identity
            .iter()
            .flat_map(|(chain, addrs)| {
                addrs
                    .keys()
                    .map(move |addr| (addr.clone(), chain.clone()))
            })
            .collect()
    }

    pub fn identity_count(&self) -> usize {
        self.identity_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn watchlist_with_binance() -> Arc<Watchlist> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ethereum.json"),
            serde_json::json!({
                "chain": "ethereum",
                "addresses": {
                    "exchanges": {
                        "Binance 14": "0x28c6c06298d514db089934071355e5743bf21d60"
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        Arc::new(Watchlist::from_directory(dir.path()).unwrap())
    }

    fn identity_entry(address: &str, label: &str, project: &str) -> IdentityEntry {
        IdentityEntry {
            address: address.to_string(),
            chain: "ethereum".to_string(),
            label: label.to_string(),
            project: project.to_string(),
            category: "cex".to_string(),
        }
    }

    #[test]
    fn watchlist_outranks_identity() {
        let mut registry = LabelRegistry::new(watchlist_with_binance());
        registry.merge_identity(vec![identity_entry(
            "0x28c6c06298d514db089934071355e5743bf21d60",
            "Identity Name",
            "",
        )]);
        // The identity row for a watchlist address is skipped entirely.
        assert_eq!(registry.identity_count(), 0);
        assert_eq!(
            registry
                .label_of("0x28C6C06298d514Db089934071355E5743bf21d60", Some("ethereum"))
                .as_deref(),
            Some("Binance 14")
        );
    }

    #[test]
    fn identity_fills_gaps_with_project_fallback() {
        let mut registry = LabelRegistry::new(watchlist_with_binance());
        registry.merge_identity(vec![identity_entry(
            "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            "",
            "kraken",
        )]);
        assert_eq!(
            registry
                .label_of("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", Some("ethereum"))
                .as_deref(),
            Some("kraken")
        );
    }

    #[test]
    fn unknown_address_has_no_label() {
        let registry = LabelRegistry::new(watchlist_with_binance());
        assert!(registry
            .label_of("0x0000000000000000000000000000000000000001", Some("ethereum"))
            .is_none());
    }
}
