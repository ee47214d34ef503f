//! Serde models for the Allium API and the internal whale alert types.
//!
//! Transfers are an untagged union over chain families; activities are an
//! internally tagged union (`type` discriminator) with an explicit catch-all
//! so an unrecognized activity never rejects the whole transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// SHARED PRIMITIVES
// ============================================

/// Amount payload attached to transfers and activities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetAmount {
    #[serde(default)]
    pub raw_amount: Option<String>,
    #[serde(default)]
    pub amount_str: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvmAssetKind {
    Native,
    EvmErc20,
    EvmErc721,
    EvmErc1155,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolanaAssetKind {
    Native,
    SolSpl,
    SolNft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitcoinAssetKind {
    Native,
    BtcInscription,
    BtcBrc20,
    BtcRune,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmAsset {
    #[serde(rename = "type", default)]
    pub kind: Option<EvmAssetKind>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub token_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaAsset {
    #[serde(rename = "type", default)]
    pub kind: Option<SolanaAssetKind>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub token_id: Option<String>,
}

/// Bitcoin assets carry no contract address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinAsset {
    #[serde(rename = "type", default)]
    pub kind: Option<BitcoinAssetKind>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub token_id: Option<String>,
}

/// Common view over the asset families for price lookups.
pub trait PricedAsset {
    fn is_native(&self) -> bool;
    fn address(&self) -> Option<&str>;
    fn symbol(&self) -> Option<&str>;
}

impl PricedAsset for EvmAsset {
    fn is_native(&self) -> bool {
        self.kind == Some(EvmAssetKind::Native)
    }
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
    fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
}

impl PricedAsset for SolanaAsset {
    fn is_native(&self) -> bool {
        self.kind == Some(SolanaAssetKind::Native)
    }
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
    fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
}

/// Activity legs may be either EVM or Solana assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TradeAsset {
    Evm(EvmAsset),
    Solana(SolanaAsset),
}

impl PricedAsset for TradeAsset {
    fn is_native(&self) -> bool {
        match self {
            TradeAsset::Evm(a) => a.is_native(),
            TradeAsset::Solana(a) => a.is_native(),
        }
    }
    fn address(&self) -> Option<&str> {
        match self {
            TradeAsset::Evm(a) => a.address(),
            TradeAsset::Solana(a) => a.address(),
        }
    }
    fn symbol(&self) -> Option<&str> {
        match self {
            TradeAsset::Evm(a) => a.symbol(),
            TradeAsset::Solana(a) => a.symbol(),
        }
    }
}

// ============================================
// TRANSFERS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvmOperation {
    Mint,
    Burn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolanaTransferType {
    Sent,
    Received,
    Invalid,
    Minted,
    Burned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmTransfer {
    pub transfer_type: TransferDirection,
    #[serde(default)]
    pub operation: Option<EvmOperation>,
    pub transaction_hash: String,
    #[serde(default)]
    pub log_index: Option<i64>,
    pub from_address: String,
    pub to_address: String,
    pub asset: EvmAsset,
    pub amount: AssetAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaTransfer {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<i64>,
    pub transfer_type: SolanaTransferType,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub from_token_account: Option<String>,
    #[serde(default)]
    pub to_token_account: Option<String>,
    pub asset: SolanaAsset,
    pub amount: AssetAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinTransfer {
    pub transfer_type: TransferDirection,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    pub asset: BitcoinAsset,
    pub amount: AssetAmount,
}

/// Chain-family transfer union, tried in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transfer {
    Evm(EvmTransfer),
    Solana(SolanaTransfer),
    Bitcoin(BitcoinTransfer),
}

// ============================================
// ACTIVITIES
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexTradeActivity {
    pub transaction_hash: String,
    #[serde(default)]
    pub log_index: Option<i64>,
    #[serde(default)]
    pub trace_index: Option<i64>,
    pub asset_bought: TradeAsset,
    pub asset_sold: TradeAsset,
    pub amount_bought: AssetAmount,
    pub amount_sold: AssetAmount,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBridgeActivity {
    pub transaction_hash: String,
    #[serde(default)]
    pub log_index: Option<i64>,
    #[serde(default)]
    pub trace_index: Option<i64>,
    pub protocol: String,
    pub sender_address: String,
    pub recipient_address: String,
    pub token_in_asset: EvmAsset,
    pub token_in_amount: AssetAmount,
    pub token_out_asset: EvmAsset,
    pub token_out_amount: AssetAmount,
    pub direction: String,
    pub source_chain: String,
    pub destination_chain: String,
}

/// Shared shape for liquidity pool mint and burn events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPoolActivity {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    pub liquidity_pool_address: String,
    pub token0: EvmAsset,
    pub token1: EvmAsset,
    pub token0_amount: AssetAmount,
    pub token1_amount: AssetAmount,
    #[serde(default)]
    pub lp_tokens_amount: Option<i64>,
    pub transaction_hash: String,
    pub log_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPoolCreatedActivity {
    pub transaction_hash: String,
    #[serde(default)]
    pub pool_id: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub liquidity_pool_address: Option<String>,
    #[serde(default)]
    pub token0: Option<EvmAsset>,
    #[serde(default)]
    pub token1: Option<EvmAsset>,
    #[serde(default)]
    pub log_index: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetApprovalActivity {
    pub asset: EvmAsset,
    pub transaction_hash: String,
    #[serde(default)]
    pub log_index: Option<i64>,
    #[serde(default)]
    pub trace_index: Option<i64>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub spender_address: Option<String>,
    #[serde(default)]
    pub approved_amount: Option<AssetAmount>,
    pub status: ApprovalStatus,
    pub granularity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftTradeActivity {
    pub side: String,
    pub transaction_hash: String,
    #[serde(default)]
    pub log_index: Option<i64>,
    #[serde(default)]
    pub trace_index: Option<i64>,
    pub asset: TradeAsset,
    pub asset_amount: AssetAmount,
    pub currency: TradeAsset,
    pub currency_amount: AssetAmount,
    pub buyer_address: String,
    pub seller_address: String,
    pub marketplace: String,
    pub protocol: String,
}

/// Activity shapes the pipeline understands, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownActivity {
    DexTrade(DexTradeActivity),
    AssetBridge(AssetBridgeActivity),
    DexLiquidityPoolMint(LiquidityPoolActivity),
    DexLiquidityPoolBurn(LiquidityPoolActivity),
    DexLiquidityPoolCreated(LiquidityPoolCreatedActivity),
    AssetApproval(AssetApprovalActivity),
    NftTrade(NftTradeActivity),
}

/// Catch-all for activity types the upstream schema may add. Keeps the raw
/// tag so logs stay useful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownActivity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// Decodes a known activity when the payload matches, otherwise degrades to
/// `Unknown` instead of failing the enclosing transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Activity {
    Known(KnownActivity),
    Unknown(UnknownActivity),
}

// ============================================
// WALLET TRANSACTIONS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub address: String,
    pub chain: String,
    pub hash: String,
    pub index: i64,
    #[serde(default)]
    pub within_block_order_key: Option<i64>,
    pub block_timestamp: DateTime<Utc>,
    pub block_number: i64,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub fee: Option<AssetAmount>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub asset_transfers: Vec<Transfer>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionsResponse {
    #[serde(default)]
    pub items: Vec<WalletTransaction>,
    #[serde(default)]
    pub cursor: Option<String>,
}

// ============================================
// PRICES
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPrice {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub chain: String,
    pub address: String,
    #[serde(default)]
    pub decimals: Option<u32>,
    pub price: f64,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricesResponse {
    #[serde(default)]
    pub items: Vec<TokenPrice>,
    #[serde(default)]
    pub cursor: Option<String>,
}

// ============================================
// WHALE ALERTS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Transfer,
    Mint,
    Burn,
    DexTrade,
    Bridge,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Transfer => "transfer",
            AlertType::Mint => "mint",
            AlertType::Burn => "burn",
            AlertType::DexTrade => "dex_trade",
            AlertType::Bridge => "bridge",
        }
    }
}

/// The pipeline's output entity. Never mutated after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleAlert {
    pub tx_hash: String,
    pub chain: String,
    pub block_timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub from_label: Option<String>,
    #[serde(default)]
    pub to_label: Option<String>,
    #[serde(default)]
    pub asset_symbol: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub usd_value: f64,
    // Extra context for specific alert types
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub source_chain: Option<String>,
    #[serde(default)]
    pub destination_chain: Option<String>,
    #[serde(default)]
    pub asset_bought_symbol: Option<String>,
    #[serde(default)]
    pub asset_sold_symbol: Option<String>,
    #[serde(default)]
    pub amount_bought: Option<f64>,
    #[serde(default)]
    pub amount_sold: Option<f64>,
}

impl WhaleAlert {
    pub fn new(
        tx_hash: &str,
        chain: &str,
        block_timestamp: DateTime<Utc>,
        alert_type: AlertType,
    ) -> Self {
        Self {
            tx_hash: tx_hash.to_string(),
            chain: chain.to_string(),
            block_timestamp,
            alert_type,
            from_address: None,
            to_address: None,
            from_label: None,
            to_label: None,
            asset_symbol: None,
            amount: None,
            usd_value: 0.0,
            protocol: None,
            source_chain: None,
            destination_chain: None,
            asset_bought_symbol: None,
            asset_sold_symbol: None,
            amount_bought: None,
            amount_sold: None,
        }
    }
}

/// A whale alert enriched with geo coordinates for both counterparties.
/// This is the JSON shape served over REST and WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedAlert {
    #[serde(flatten)]
    pub alert: WhaleAlert,
    pub from_lat: Option<f64>,
    pub from_lon: Option<f64>,
    pub from_country: Option<String>,
    pub to_lat: Option<f64>,
    pub to_lon: Option<f64>,
    pub to_country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_evm_erc20_transfer() {
        let raw = json!({
            "transfer_type": "sent",
            "transaction_hash": "0xabc",
            "from_address": "0xfrom",
            "to_address": "0xto",
            "asset": {
                "type": "evm_erc20",
                "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                "symbol": "USDC",
                "decimals": 6
            },
            "amount": {"amount": 1500.0}
        });
        let transfer: Transfer = serde_json::from_value(raw).unwrap();
        match transfer {
            Transfer::Evm(t) => {
                assert_eq!(t.asset.symbol.as_deref(), Some("USDC"));
                assert_eq!(t.operation, None);
                assert_eq!(t.amount.amount, Some(1500.0));
            }
            other => panic!("expected EVM transfer, got {other:?}"),
        }
    }

    #[test]
    fn decodes_evm_mint_operation() {
        let raw = json!({
            "transfer_type": "received",
            "operation": "mint",
            "transaction_hash": "0xabc",
            "from_address": "0x0000000000000000000000000000000000000000",
            "to_address": "0xto",
            "asset": {"type": "evm_erc20", "address": "0xdac1", "symbol": "USDT"},
            "amount": {"amount": 1.0}
        });
        let transfer: Transfer = serde_json::from_value(raw).unwrap();
        match transfer {
            Transfer::Evm(t) => assert_eq!(t.operation, Some(EvmOperation::Mint)),
            other => panic!("expected EVM transfer, got {other:?}"),
        }
    }

    #[test]
    fn decodes_solana_minted_transfer() {
        let raw = json!({
            "transfer_type": "minted",
            "to_address": "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
            "asset": {"type": "sol_spl", "address": "EPjFW...", "symbol": "USDC"},
            "amount": {"amount": 42.0}
        });
        let transfer: Transfer = serde_json::from_value(raw).unwrap();
        match transfer {
            Transfer::Solana(t) => {
                assert_eq!(t.transfer_type, SolanaTransferType::Minted);
                assert!(t.from_address.is_none());
            }
            other => panic!("expected Solana transfer, got {other:?}"),
        }
    }

    #[test]
    fn decodes_known_activity() {
        let raw = json!({
            "type": "dex_trade",
            "transaction_hash": "0xdeadbeef",
            "asset_bought": {"type": "evm_erc20", "address": "0xaaa", "symbol": "WETH"},
            "asset_sold": {"type": "evm_erc20", "address": "0xbbb", "symbol": "USDC"},
            "amount_bought": {"amount": 10.0},
            "amount_sold": {"amount": 30000.0},
            "protocol": "uniswap_v3"
        });
        let activity: Activity = serde_json::from_value(raw).unwrap();
        match activity {
            Activity::Known(KnownActivity::DexTrade(trade)) => {
                assert_eq!(trade.protocol.as_deref(), Some("uniswap_v3"));
                assert_eq!(trade.amount_sold.amount, Some(30000.0));
            }
            other => panic!("expected dex_trade, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_activity_falls_back_to_unknown() {
        let raw = json!({
            "type": "perp_position_opened",
            "transaction_hash": "0xfff",
            "leverage": 10
        });
        let activity: Activity = serde_json::from_value(raw).unwrap();
        match activity {
            Activity::Unknown(u) => {
                assert_eq!(u.kind, "perp_position_opened");
                assert_eq!(u.transaction_hash.as_deref(), Some("0xfff"));
            }
            other => panic!("expected unknown activity, got {other:?}"),
        }
    }

    #[test]
    fn malformed_known_activity_does_not_reject_transaction() {
        // dex_trade missing its legs still decodes, as Unknown.
        let raw = json!({
            "id": "tx-1",
            "address": "0xabc",
            "chain": "ethereum",
            "hash": "0x111",
            "index": 0,
            "block_timestamp": "2026-01-01T00:00:00Z",
            "block_number": 100,
            "activities": [{"type": "dex_trade", "transaction_hash": "0x111"}]
        });
        let tx: WalletTransaction = serde_json::from_value(raw).unwrap();
        assert!(matches!(tx.activities[0], Activity::Unknown(_)));
    }

    #[test]
    fn alert_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(AlertType::DexTrade).unwrap(),
            json!("dex_trade")
        );
        assert_eq!(AlertType::Bridge.as_str(), "bridge");
    }
}
