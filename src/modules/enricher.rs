//! Token price collection and USD valuation.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::models::{Activity, KnownActivity, PricedAsset, Transfer, WalletTransaction};
use crate::utils::allium::{AlliumClient, TokenRef, MAX_TOKENS_PER_BATCH};

/// (lowercased token address, chain) -> USD price. Built fresh per batch.
pub type PriceMap = HashMap<(String, String), f64>;

/// Native coin -> wrapped-equivalent contract for price lookups. Chains
/// without a mapping are skipped; no price is sought for their native coin.
fn wrapped_native(chain: &str) -> Option<&'static str> {
    match chain {
        "ethereum" => Some("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"), // WETH
        "polygon" => Some("0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),  // WMATIC
        "arbitrum" => Some("0x82af49447d8a07e3bd95bd0d56f35241523fbab1"), // WETH on Arbitrum
        "optimism" | "base" => Some("0x4200000000000000000000000000000000000006"), // canonical WETH
        "solana" => Some("So11111111111111111111111111111111111111112"), // WSOL
        "bitcoin" => Some("btc"),
        _ => None,
    }
}

/// Resolve the (token_address, chain) price key for an asset, rewriting
/// native assets to their chain's wrapped equivalent.
pub fn asset_key(asset: &dyn PricedAsset, chain: &str) -> Option<(String, String)> {
    match asset.address() {
        Some(address) if !asset.is_native() => {
            Some((address.to_lowercase(), chain.to_string()))
        }
        _ => wrapped_native(chain).map(|wrapped| (wrapped.to_lowercase(), chain.to_string())),
    }
}

fn push_key(
    key: Option<(String, String)>,
    seen: &mut HashSet<(String, String)>,
    tokens: &mut Vec<TokenRef>,
) {
    if let Some(key) = key {
        if seen.insert(key.clone()) {
            tokens.push(TokenRef {
                token_address: key.0,
                chain: key.1,
            });
        }
    }
}

/// Gather unique (token_address, chain) pairs from every transfer and every
/// activity's constituent assets, in discovery order.
pub fn collect_token_keys(txs: &[WalletTransaction]) -> Vec<TokenRef> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut tokens: Vec<TokenRef> = Vec::new();

    for tx in txs {
        for transfer in &tx.asset_transfers {
            match transfer {
                Transfer::Evm(t) => push_key(asset_key(&t.asset, &tx.chain), &mut seen, &mut tokens),
                Transfer::Solana(t) => {
                    push_key(asset_key(&t.asset, &tx.chain), &mut seen, &mut tokens)
                }
                // Bitcoin transfers are all native; go through the chain mapping.
                Transfer::Bitcoin(_) => push_key(
                    wrapped_native(&tx.chain).map(|w| (w.to_lowercase(), tx.chain.clone())),
                    &mut seen,
                    &mut tokens,
                ),
            }
        }

        for activity in &tx.activities {
            let Activity::Known(known) = activity else {
                continue;
            };
            match known {
                KnownActivity::DexTrade(trade) => {
                    push_key(asset_key(&trade.asset_bought, &tx.chain), &mut seen, &mut tokens);
                    push_key(asset_key(&trade.asset_sold, &tx.chain), &mut seen, &mut tokens);
                }
                KnownActivity::AssetBridge(bridge) => {
                    push_key(
                        asset_key(&bridge.token_in_asset, &tx.chain),
                        &mut seen,
                        &mut tokens,
                    );
                    push_key(
                        asset_key(&bridge.token_out_asset, &tx.chain),
                        &mut seen,
                        &mut tokens,
                    );
                }
                KnownActivity::DexLiquidityPoolMint(pool)
                | KnownActivity::DexLiquidityPoolBurn(pool) => {
                    push_key(asset_key(&pool.token0, &tx.chain), &mut seen, &mut tokens);
                    push_key(asset_key(&pool.token1, &tx.chain), &mut seen, &mut tokens);
                }
                _ => {}
            }
        }
    }

    tokens
}

/// Fetch prices for all tokens referenced in the transactions. A failing
/// batch contributes no entries and never aborts the remaining batches.
pub async fn build_price_map(client: &AlliumClient, txs: &[WalletTransaction]) -> PriceMap {
    let token_keys = collect_token_keys(txs);
    if token_keys.is_empty() {
        return PriceMap::new();
    }

    let mut price_map = PriceMap::new();
    for (i, batch) in token_keys.chunks(MAX_TOKENS_PER_BATCH).enumerate() {
        match client.fetch_prices(batch).await {
            Ok(resp) => {
                for item in resp.items {
                    price_map.insert((item.address.to_lowercase(), item.chain), item.price);
                }
            }
            Err(e) => {
                warn!(target: "ENRICHER", "Price fetch failed for batch {}: {}", i, e);
            }
        }
    }

    info!(
        target: "ENRICHER",
        "Fetched prices for {} / {} tokens",
        price_map.len(),
        token_keys.len()
    );
    price_map
}

/// USD value for an (asset, amount) pair. Returns 0.0 when the amount is
/// absent or zero, or when no price entry exists for the resolved key.
pub fn usd_value(
    asset: &dyn PricedAsset,
    amount: Option<f64>,
    chain: &str,
    price_map: &PriceMap,
) -> f64 {
    let Some(amount) = amount else {
        return 0.0;
    };
    if amount == 0.0 {
        return 0.0;
    }
    let Some(key) = asset_key(asset, chain) else {
        return 0.0;
    };
    amount * price_map.get(&key).copied().unwrap_or(0.0)
}
