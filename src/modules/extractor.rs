//! Turn raw wallet transactions into typed whale alerts.

use crate::models::{
    Activity, AlertType, EvmOperation, KnownActivity, PricedAsset, SolanaTransferType, Transfer,
    WalletTransaction, WhaleAlert,
};
use crate::modules::enricher::{usd_value, PriceMap};
use crate::utils::labels::LabelRegistry;

/// Classify a transfer as mint/burn/transfer by chain-specific tag
/// inspection. Absence of either tag means a plain transfer.
fn classify_transfer(transfer: &Transfer) -> AlertType {
    match transfer {
        Transfer::Evm(t) => match t.operation {
            Some(EvmOperation::Mint) => AlertType::Mint,
            Some(EvmOperation::Burn) => AlertType::Burn,
            None => AlertType::Transfer,
        },
        Transfer::Solana(t) => match t.transfer_type {
            SolanaTransferType::Minted => AlertType::Mint,
            SolanaTransferType::Burned => AlertType::Burn,
            _ => AlertType::Transfer,
        },
        Transfer::Bitcoin(_) => AlertType::Transfer,
    }
}

/// Parse a single transaction into zero or more whale alerts.
///
/// Pure over its inputs: one alert per valued transfer, one per DEX trade
/// (valued at the larger leg), one per bridge (valued at the inbound leg).
/// Liquidity events, approvals, NFT trades, unknown activities, and
/// anything on Bitcoin produce no alert. Dedup happens downstream.
pub fn extract_alerts(
    tx: &WalletTransaction,
    price_map: &PriceMap,
    labels: &LabelRegistry,
) -> Vec<WhaleAlert> {
    let mut alerts = Vec::new();
    let chain = tx.chain.as_str();

    let label_of =
        |address: Option<&String>| address.and_then(|a| labels.label_of(a, Some(chain)));

    if chain != "bitcoin" {
        for transfer in &tx.asset_transfers {
            let (from_addr, to_addr, symbol, amount, usd) = match transfer {
                Transfer::Evm(t) => (
                    Some(t.from_address.clone()),
                    Some(t.to_address.clone()),
                    t.asset.symbol.clone(),
                    t.amount.amount,
                    usd_value(&t.asset, t.amount.amount, chain, price_map),
                ),
                Transfer::Solana(t) => (
                    t.from_address.clone(),
                    t.to_address.clone(),
                    t.asset.symbol.clone(),
                    t.amount.amount,
                    usd_value(&t.asset, t.amount.amount, chain, price_map),
                ),
                Transfer::Bitcoin(_) => continue,
            };

            let mut alert =
                WhaleAlert::new(&tx.hash, chain, tx.block_timestamp, classify_transfer(transfer));
            alert.from_label = label_of(from_addr.as_ref());
            alert.to_label = label_of(to_addr.as_ref());
            alert.from_address = from_addr;
            alert.to_address = to_addr;
            alert.asset_symbol = symbol;
            alert.amount = amount;
            alert.usd_value = usd;
            alerts.push(alert);
        }
    }

    for activity in &tx.activities {
        let Activity::Known(known) = activity else {
            continue;
        };
        match known {
            KnownActivity::DexTrade(trade) => {
                let usd_bought =
                    usd_value(&trade.asset_bought, trade.amount_bought.amount, chain, price_map);
                let usd_sold =
                    usd_value(&trade.asset_sold, trade.amount_sold.amount, chain, price_map);

                let mut alert =
                    WhaleAlert::new(&tx.hash, chain, tx.block_timestamp, AlertType::DexTrade);
                // The larger leg best represents the trade's significance,
                // even when one side's price is unavailable. The activity
                // has no trader field, so the transaction-level from/to are
                // the counterparties.
                alert.usd_value = usd_bought.max(usd_sold);
                alert.from_label = label_of(tx.from_address.as_ref());
                alert.to_label = label_of(tx.to_address.as_ref());
                alert.from_address = tx.from_address.clone();
                alert.to_address = tx.to_address.clone();
                alert.asset_bought_symbol = trade.asset_bought.symbol().map(str::to_string);
                alert.asset_sold_symbol = trade.asset_sold.symbol().map(str::to_string);
                alert.amount_bought = trade.amount_bought.amount;
                alert.amount_sold = trade.amount_sold.amount;
                alert.protocol = trade.protocol.clone().or_else(|| trade.project.clone());
                alerts.push(alert);
            }
            KnownActivity::AssetBridge(bridge) => {
                let mut alert =
                    WhaleAlert::new(&tx.hash, chain, tx.block_timestamp, AlertType::Bridge);
                // Inbound leg only; the outbound leg is the same value on
                // the other chain.
                alert.usd_value = usd_value(
                    &bridge.token_in_asset,
                    bridge.token_in_amount.amount,
                    chain,
                    price_map,
                );
                alert.from_label = labels.label_of(&bridge.sender_address, Some(chain));
                alert.to_label = labels.label_of(&bridge.recipient_address, Some(chain));
                alert.from_address = Some(bridge.sender_address.clone());
                alert.to_address = Some(bridge.recipient_address.clone());
                alert.asset_symbol = bridge.token_in_asset.symbol.clone();
                alert.amount = bridge.token_in_amount.amount;
                alert.protocol = Some(bridge.protocol.clone());
                alert.source_chain = Some(bridge.source_chain.clone());
                alert.destination_chain = Some(bridge.destination_chain.clone());
                alerts.push(alert);
            }
            // Liquidity events, approvals, and NFT trades are not whale
            // alerts in this version.
            _ => {}
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::watchlist::Watchlist;
    use serde_json::json;
    use std::sync::Arc;

    fn empty_labels() -> LabelRegistry {
        LabelRegistry::new(Arc::new(Watchlist::default()))
    }

    fn usdc_price_map() -> PriceMap {
        let mut map = PriceMap::new();
        map.insert(
            (
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
                "ethereum".to_string(),
            ),
            1.0,
        );
        map
    }

    fn tx_with(transfers: serde_json::Value, activities: serde_json::Value) -> WalletTransaction {
        serde_json::from_value(json!({
            "id": "tx-1",
            "address": "0xwatched",
            "chain": "ethereum",
            "hash": "0x111",
            "index": 0,
            "block_timestamp": "2026-01-01T00:00:00Z",
            "block_number": 100,
            "from_address": "0xsender",
            "to_address": "0xrouter",
            "asset_transfers": transfers,
            "activities": activities
        }))
        .unwrap()
    }

    #[test]
    fn single_evm_mint_yields_exactly_one_mint_alert() {
        let tx = tx_with(
            json!([{
                "transfer_type": "received",
                "operation": "mint",
                "transaction_hash": "0x111",
                "from_address": "0x0000000000000000000000000000000000000000",
                "to_address": "0xminter",
                "asset": {
                    "type": "evm_erc20",
                    "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                    "symbol": "USDC"
                },
                "amount": {"amount": 5_000_000.0}
            }]),
            json!([]),
        );

        let alerts = extract_alerts(&tx, &usdc_price_map(), &empty_labels());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Mint);
        assert_eq!(alerts[0].usd_value, 5_000_000.0);
        assert_eq!(alerts[0].asset_symbol.as_deref(), Some("USDC"));
    }

    #[test]
    fn solana_burned_transfer_classifies_as_burn() {
        let tx: WalletTransaction = serde_json::from_value(json!({
            "id": "tx-2",
            "address": "someSolAddr",
            "chain": "solana",
            "hash": "sig111",
            "index": 0,
            "block_timestamp": "2026-01-01T00:00:00Z",
            "block_number": 200,
            "asset_transfers": [{
                "transfer_type": "burned",
                "from_address": "burner",
                "asset": {"type": "sol_spl", "address": "EPjF...", "symbol": "USDC"},
                "amount": {"amount": 10.0}
            }]
        }))
        .unwrap();

        let alerts = extract_alerts(&tx, &PriceMap::new(), &empty_labels());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Burn);
        // No price entry: valued at zero, still a well-formed alert.
        assert_eq!(alerts[0].usd_value, 0.0);
    }

    #[test]
    fn dex_trade_uses_larger_leg_and_tx_counterparties() {
        let tx = tx_with(
            json!([]),
            json!([{
                "type": "dex_trade",
                "transaction_hash": "0x111",
                "asset_bought": {"type": "evm_erc20", "address": "0xunpriced", "symbol": "MEME"},
                "asset_sold": {
                    "type": "evm_erc20",
                    "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                    "symbol": "USDC"
                },
                "amount_bought": {"amount": 1_000_000.0},
                "amount_sold": {"amount": 2_500_000.0},
                "project": "uniswap",
                "protocol": "uniswap_v3"
            }]),
        );

        let alerts = extract_alerts(&tx, &usdc_price_map(), &empty_labels());
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.alert_type, AlertType::DexTrade);
        // Bought leg has no price; the sold leg carries the value.
        assert_eq!(alert.usd_value, 2_500_000.0);
        assert_eq!(alert.from_address.as_deref(), Some("0xsender"));
        assert_eq!(alert.to_address.as_deref(), Some("0xrouter"));
        assert_eq!(alert.protocol.as_deref(), Some("uniswap_v3"));
    }

    #[test]
    fn bridge_uses_inbound_leg_and_explicit_addresses() {
        let tx = tx_with(
            json!([]),
            json!([{
                "type": "asset_bridge",
                "transaction_hash": "0x111",
                "protocol": "stargate",
                "sender_address": "0xalice",
                "recipient_address": "0xbob",
                "token_in_asset": {
                    "type": "evm_erc20",
                    "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                    "symbol": "USDC"
                },
                "token_in_amount": {"amount": 4_000_000.0},
                "token_out_asset": {"type": "evm_erc20", "address": "0xother", "symbol": "USDC"},
                "token_out_amount": {"amount": 3_999_000.0},
                "direction": "out",
                "source_chain": "ethereum",
                "destination_chain": "arbitrum"
            }]),
        );

        let alerts = extract_alerts(&tx, &usdc_price_map(), &empty_labels());
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.alert_type, AlertType::Bridge);
        assert_eq!(alert.usd_value, 4_000_000.0);
        assert_eq!(alert.from_address.as_deref(), Some("0xalice"));
        assert_eq!(alert.to_address.as_deref(), Some("0xbob"));
        assert_eq!(alert.source_chain.as_deref(), Some("ethereum"));
        assert_eq!(alert.destination_chain.as_deref(), Some("arbitrum"));
    }

    #[test]
    fn liquidity_and_unknown_activities_yield_no_alerts() {
        let tx = tx_with(
            json!([]),
            json!([
                {
                    "type": "dex_liquidity_pool_mint",
                    "liquidity_pool_address": "0xpool",
                    "token0": {"type": "evm_erc20", "address": "0xaaa"},
                    "token1": {"type": "evm_erc20", "address": "0xbbb"},
                    "token0_amount": {"amount": 1.0},
                    "token1_amount": {"amount": 2.0},
                    "transaction_hash": "0x111",
                    "log_index": 3
                },
                {"type": "somehow_new_activity", "transaction_hash": "0x111"}
            ]),
        );

        assert!(extract_alerts(&tx, &PriceMap::new(), &empty_labels()).is_empty());
    }

    #[test]
    fn bitcoin_transactions_produce_no_transfer_alerts() {
        let tx: WalletTransaction = serde_json::from_value(json!({
            "id": "tx-3",
            "address": "bc1qsomeaddress",
            "chain": "bitcoin",
            "hash": "btc111",
            "index": 0,
            "block_timestamp": "2026-01-01T00:00:00Z",
            "block_number": 800000,
            "asset_transfers": [{
                "transfer_type": "sent",
                "from_address": "bc1qfrom",
                "to_address": "bc1qto",
                "asset": {"type": "native", "symbol": "BTC"},
                "amount": {"amount": 100.0}
            }]
        }))
        .unwrap();

        assert!(extract_alerts(&tx, &PriceMap::new(), &empty_labels()).is_empty());
    }

    #[test]
    fn multiple_transfers_yield_independent_alerts() {
        let transfer = json!({
            "transfer_type": "sent",
            "transaction_hash": "0x111",
            "from_address": "0xfrom",
            "to_address": "0xto",
            "asset": {
                "type": "evm_erc20",
                "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                "symbol": "USDC"
            },
            "amount": {"amount": 100.0}
        });
        let tx = tx_with(json!([transfer.clone(), transfer]), json!([]));

        let alerts = extract_alerts(&tx, &usdc_price_map(), &empty_labels());
        // Two physical transfers, two alerts; dedup is downstream's job.
        assert_eq!(alerts.len(), 2);
    }
}
