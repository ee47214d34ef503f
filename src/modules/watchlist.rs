//! Watched address table loaded from JSON files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::utils::allium::AddressRef;

/// Chains whose addresses are hex and case-insensitive. Everything else
/// (Solana Base58, Bitcoin Base58Check) is case-sensitive and stored as-is.
const EVM_CHAINS: [&str; 17] = [
    "ethereum", "polygon", "arbitrum", "optimism", "base", "avalanche", "bsc", "fantom",
    "gnosis", "celo", "linea", "scroll", "zksync", "blast", "mantle", "mode", "zora",
];

fn is_evm_chain(chain: &str) -> bool {
    EVM_CHAINS.contains(&chain)
}

/// Lowercase only EVM addresses; preserve case for everything else.
pub fn normalize_address(address: &str, chain: &str) -> String {
    if is_evm_chain(chain) {
        address.to_lowercase()
    } else {
        address.to_string()
    }
}

/// On-disk shape: `{"chain": ..., "addresses": {category: {label: address}}}`.
#[derive(Debug, Deserialize)]
struct WatchlistFile {
    chain: String,
    addresses: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
struct WatchEntry {
    label: String,
    category: String,
}

/// chain -> normalized address -> (label, category). BTreeMaps keep
/// iteration order stable across restarts, which the geo layout relies on.
#[derive(Debug, Default)]
pub struct Watchlist {
    entries: BTreeMap<String, BTreeMap<String, WatchEntry>>,
}

impl Watchlist {
    /// Load every `*.json` file in the directory, sorted by file name.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        let mut watchlist = Self::default();

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("reading watchlist directory {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let raw = std::fs::read_to_string(&path)?;
            let file: WatchlistFile = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;

            let chain_map = watchlist.entries.entry(file.chain.clone()).or_default();
            for (category, addresses) in file.addresses {
                for (label, address) in addresses {
                    let key = normalize_address(&address, &file.chain);
                    chain_map.insert(
                        key,
                        WatchEntry {
                            label,
                            category: category.clone(),
                        },
                    );
                }
            }
            info!(
                target: "WATCHLIST",
                "Loaded {} addresses for {} from {}",
                chain_map.len(),
                file.chain,
                path.file_name().and_then(|n| n.to_str()).unwrap_or("?")
            );
        }

        Ok(watchlist)
    }

    fn lookup(&self, address: &str, chain: Option<&str>) -> Option<&WatchEntry> {
        match chain {
            Some(chain) => self
                .entries
                .get(chain)?
                .get(&normalize_address(address, chain)),
            None => self
                .entries
                .iter()
                .find_map(|(chain, map)| map.get(&normalize_address(address, chain))),
        }
    }

    pub fn label_of(&self, address: &str, chain: Option<&str>) -> Option<&str> {
        self.lookup(address, chain).map(|e| e.label.as_str())
    }

    pub fn category_of(&self, address: &str, chain: Option<&str>) -> Option<&str> {
        self.lookup(address, chain).map(|e| e.category.as_str())
    }

    /// Flat list of every watched (chain, address) pair.
    pub fn all_entries(&self) -> Vec<AddressRef> {
        self.entries
            .iter()
            .flat_map(|(chain, map)| {
                map.keys().map(move |address| AddressRef {
                    chain: chain.clone(),
                    address: address.clone(),
                })
            })
            .collect()
    }

    /// Split entries into groups of `size` for batched API calls.
    pub fn batches(&self, size: usize, exclude_chains: &[&str]) -> Vec<Vec<AddressRef>> {
        let entries: Vec<AddressRef> = self
            .all_entries()
            .into_iter()
            .filter(|e| !exclude_chains.contains(&e.chain.as_str()))
            .collect();
        entries.chunks(size).map(|chunk| chunk.to_vec()).collect()
    }

    pub fn total_addresses(&self) -> usize {
        self.entries.values().map(|map| map.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn load_sample() -> Watchlist {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ethereum.json"),
            serde_json::json!({
                "chain": "ethereum",
                "addresses": {
                    "exchanges": {
                        "Binance 14": "0x28C6c06298d514Db089934071355E5743bf21d60",
                        "Kraken": "0x2910543af39aba0cd09dbb2d50200b3e800a63d2"
                    },
                    "whales": {
                        "Big Fish": "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("solana.json"),
            serde_json::json!({
                "chain": "solana",
                "addresses": {
                    "exchanges": {
                        "Binance SOL": "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        Watchlist::from_directory(dir.path()).unwrap()
    }

    #[test]
    fn evm_lookup_is_case_insensitive() {
        let wl = load_sample();
        assert_eq!(
            wl.label_of("0x28C6C06298D514DB089934071355E5743BF21D60", Some("ethereum")),
            Some("Binance 14")
        );
        assert_eq!(
            wl.category_of("0x28c6c06298d514db089934071355e5743bf21d60", Some("ethereum")),
            Some("exchanges")
        );
    }

    #[test]
    fn solana_lookup_preserves_case() {
        let wl = load_sample();
        assert_eq!(
            wl.label_of("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM", Some("solana")),
            Some("Binance SOL")
        );
        assert_eq!(
            wl.label_of("9wzdxwbbmkg8ztbnmquxvqrayrzzdsgydlvl9zytawwm", Some("solana")),
            None
        );
    }

    #[test]
    fn lookup_without_chain_scans_all_chains() {
        let wl = load_sample();
        assert_eq!(
            wl.label_of("0xd8da6bf26964af9d7eed9e03e53415d37aa96045", None),
            Some("Big Fish")
        );
    }

    #[test]
    fn batches_respect_size_and_exclusions() {
        let wl = load_sample();
        assert_eq!(wl.total_addresses(), 4);

        let batches = wl.batches(2, &[]);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() <= 2));

        let no_solana = wl.batches(20, &["solana"]);
        assert_eq!(no_solana.len(), 1);
        assert!(no_solana[0].iter().all(|e| e.chain == "ethereum"));
    }
}
