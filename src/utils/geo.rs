//! Category-based spiral layout — deterministic address placement.
//!
//! Watchlist addresses land on a golden-angle Fibonacci spiral inside their
//! category's region. Identity-enriched addresses get a hash offset within
//! their mapped region. Anything else gets an on-demand full-map hash
//! spread, so every address has some stable position with zero upfront cost.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

use crate::modules::watchlist::Watchlist;
use crate::utils::labels::LabelRegistry;

/// Region anchor: center point plus spread radius, all in degrees.
#[derive(Debug, Clone, Copy)]
struct Region {
    lat: f64,
    lon: f64,
    spread: f64,
}

const REGION_EXCHANGES: Region = Region { lat: 35.0, lon: -80.0, spread: 22.0 };
const REGION_DEFI: Region = Region { lat: 35.0, lon: 80.0, spread: 22.0 };
const REGION_WHALES: Region = Region { lat: -30.0, lon: -80.0, spread: 22.0 };
const REGION_FUNDS: Region = Region { lat: -30.0, lon: 80.0, spread: 22.0 };

fn region_of(key: &str) -> Region {
    match key {
        "exchanges" => REGION_EXCHANGES,
        "defi_protocols" => REGION_DEFI,
        "funds_institutions" => REGION_FUNDS,
        _ => REGION_WHALES,
    }
}

/// Map watchlist categories onto the four archipelago regions. Unrecognized
/// categories default to "whales".
fn canonical_category(category: &str) -> &'static str {
    match category {
        "exchanges" => "exchanges",
        "defi_protocols" | "treasuries" | "bridges" | "wrapped_staking" | "defi" => {
            "defi_protocols"
        }
        "funds_institutions" | "stablecoin_issuers" | "funds" | "institutions" => {
            "funds_institutions"
        }
        _ => "whales",
    }
}

/// Map identity categories (cex, dex, bridge, fund, ...) onto regions.
fn identity_region(category: &str) -> Option<&'static str> {
    match category {
        "cex" => Some("exchanges"),
        "dex" | "bridge" | "defi" => Some("defi_protocols"),
        "fund" => Some("funds_institutions"),
        "nft" => Some("whales"),
        _ => None,
    }
}

/// Place item `index` of `total` on a Fibonacci spiral around the region
/// center. The golden angle guarantees even, non-overlapping coverage.
fn spiral_position(index: usize, total: usize, region: Region) -> (f64, f64) {
    if total == 0 {
        return (region.lat, region.lon);
    }
    let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let r = region.spread * ((index as f64 + 1.0).sqrt() / (total as f64 + 1.0).sqrt());
    let theta = (index as f64 + 1.0) * golden_angle;

    let lat = (region.lat + r * theta.sin()).clamp(-75.0, 75.0);
    let lon = (region.lon + r * theta.cos()).clamp(-179.0, 179.0);
    (lat, lon)
}

fn hash_bytes(address: &str) -> (u8, u8) {
    let digest = Sha256::digest(address.as_bytes());
    (digest[0], digest[1])
}

/// Deterministic full-map spread for addresses with no category at all.
fn hash_position(address: &str) -> (f64, f64) {
    let (a, b) = hash_bytes(address);
    let lat = (a as f64 / 255.0) * 120.0 - 60.0;
    let lon = (b as f64 / 255.0) * 340.0 - 170.0;
    (lat, lon)
}

/// Deterministic position within a specific category region.
fn hash_position_in_region(address: &str, region: Region) -> (f64, f64) {
    let (a, b) = hash_bytes(address);
    let lat_offset = ((a as f64 / 255.0) - 0.5) * region.spread * 1.2;
    let lon_offset = ((b as f64 / 255.0) - 0.5) * region.spread * 1.2;
    (
        (region.lat + lat_offset).clamp(-75.0, 75.0),
        (region.lon + lon_offset).clamp(-179.0, 179.0),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct GeoEntry {
    pub address: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    pub region: String,
    pub confidence: f64,
}

/// Address → location mapping using category-based spiral layout.
pub struct GeoMap {
    entries: HashMap<String, GeoEntry>,
}

impl GeoMap {
    /// Build the map from the watchlist. Purely local, no API calls.
    pub fn from_watchlist(watchlist: &Watchlist) -> Self {
        let mut groups: HashMap<&'static str, Vec<String>> = HashMap::new();
        for entry in watchlist.all_entries() {
            let region_key = watchlist
                .category_of(&entry.address, Some(&entry.chain))
                .map(canonical_category)
                .unwrap_or("whales");
            groups.entry(region_key).or_default().push(entry.address);
        }

        let mut entries = HashMap::new();
        for (region_key, addresses) in &groups {
            let region = region_of(region_key);
            let total = addresses.len();
            for (i, address) in addresses.iter().enumerate() {
                let (lat, lon) = spiral_position(i, total, region);
                entries.insert(
                    address.clone(),
                    GeoEntry {
                        address: address.clone(),
                        lat,
                        lon,
                        country: "XX".to_string(),
                        region: region_key.to_string(),
                        confidence: 1.0,
                    },
                );
            }
        }

        info!(
            target: "GEO",
            "Placed {} watchlist addresses in {} category regions",
            entries.len(),
            groups.len()
        );
        Self { entries }
    }

    /// Assign geo to identity addresses via their category. Hash-positioned
    /// within the mapped region, lower confidence than spiral placements.
    pub fn register_identity(&mut self, labels: &LabelRegistry) {
        let mut added = 0;
        for (address, chain) in labels.identity_addresses() {
            let key = address.to_lowercase();
            if self.entries.contains_key(&key) {
                continue;
            }

            let region_key = labels
                .identity_category(&address, Some(&chain))
                .and_then(|c| identity_region(&c));

            let entry = match region_key {
                Some(rk) => {
                    let (lat, lon) = hash_position_in_region(&key, region_of(rk));
                    GeoEntry {
                        address: key.clone(),
                        lat,
                        lon,
                        country: "XX".to_string(),
                        region: rk.to_string(),
                        confidence: 0.5,
                    }
                }
                None => {
                    let (lat, lon) = hash_position(&key);
                    GeoEntry {
                        address: key.clone(),
                        lat,
                        lon,
                        country: "XX".to_string(),
                        region: "unknown".to_string(),
                        confidence: 0.0,
                    }
                }
            };
            self.entries.insert(key, entry);
            added += 1;
        }
        info!(target: "GEO", "Registered geo for {} identity addresses", added);
    }

    /// Look up geo for an address: lowercase first, then original case.
    /// Unknown addresses get a hash spread computed on demand, not persisted.
    pub fn get(&self, address: &str) -> GeoEntry {
        if let Some(entry) = self.entries.get(&address.to_lowercase()) {
            return entry.clone();
        }
        if let Some(entry) = self.entries.get(address) {
            return entry.clone();
        }
        let (lat, lon) = hash_position(address);
        GeoEntry {
            address: address.to_lowercase(),
            lat,
            lon,
            country: "XX".to_string(),
            region: "unknown".to_string(),
            confidence: 0.0,
        }
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
    use std::fs;
    use std::sync::Arc;

    fn sample_watchlist() -> Watchlist {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ethereum.json"),
            serde_json::json!({
                "chain": "ethereum",
                "addresses": {
                    "exchanges": {
                        "Binance 14": "0x28c6c06298d514db089934071355e5743bf21d60",
                        "Coinbase 10": "0x503828976d22510aad0201ac7ec88293211d23da"
                    },
                    "whales": {
                        "Big Fish": "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        Watchlist::from_directory(dir.path()).unwrap()
    }

    #[test]
    fn watchlist_addresses_get_full_confidence() {
        let geo = GeoMap::from_watchlist(&sample_watchlist());
        let entry = geo.get("0x28c6c06298d514db089934071355e5743bf21d60");
        assert_eq!(entry.confidence, 1.0);
        assert_eq!(entry.region, "exchanges");
    }

    #[test]
    fn spiral_keeps_addresses_near_their_region() {
        let geo = GeoMap::from_watchlist(&sample_watchlist());
        let entry = geo.get("0x503828976d22510aad0201ac7ec88293211d23da");
        // Exchanges anchor at (35, -80) with a 22 degree spread.
        assert!((entry.lat - 35.0).abs() <= 22.0);
        assert!((entry.lon + 80.0).abs() <= 22.0);
    }

    #[test]
    fn unknown_address_fallback_is_deterministic_and_bounded() {
        let geo = GeoMap::from_watchlist(&sample_watchlist());
        let first = geo.get("0xnever_registered_anywhere");
        let second = geo.get("0xnever_registered_anywhere");
        assert_eq!(first.lat, second.lat);
        assert_eq!(first.lon, second.lon);
        assert_eq!(first.confidence, 0.0);
        assert!((-60.0..=60.0).contains(&first.lat));
        assert!((-170.0..=170.0).contains(&first.lon));
    }

    #[test]
    fn identity_addresses_get_half_confidence_in_region() {
        let watchlist = Arc::new(sample_watchlist());
        let mut labels = LabelRegistry::new(Arc::clone(&watchlist));
        labels.merge_identity(vec![crate::utils::identity::IdentityEntry {
            address: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            chain: "ethereum".to_string(),
            label: "Some CEX".to_string(),
            project: "somecex".to_string(),
            category: "cex".to_string(),
        }]);

        let mut geo = GeoMap::from_watchlist(&watchlist);
        geo.register_identity(&labels);

        let entry = geo.get("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(entry.confidence, 0.5);
        assert_eq!(entry.region, "exchanges");
        assert!((entry.lat - 35.0).abs() <= 22.0 * 0.6 + 1e-9);
    }

    #[test]
    fn coordinates_stay_within_plottable_bounds() {
        let geo = GeoMap::from_watchlist(&sample_watchlist());
        for addr in [
            "0x28c6c06298d514db089934071355e5743bf21d60",
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
            "completely-unknown",
        ] {
            let entry = geo.get(addr);
            assert!((-75.0..=75.0).contains(&entry.lat));
            assert!((-179.0..=179.0).contains(&entry.lon));
        }
    }
}
