//! Wire types of the indexer HTTP API.
//!
//! Amounts arrive as decimal strings to survive JSON number precision; they
//! are kept as strings here and parsed at the matching boundary so one
//! malformed record skips, the batch survives. Actor fields are lowercase
//! hex with or without a `0x` prefix.

use serde::Deserialize;

/// Response of `GET /events?since=K`: everything the indexer saw between the
/// cursor and its own tip, grouped by record kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsBatch {
    /// The greatest block the indexer has fully processed.
    pub last_indexed_block: u64,

    pub since: u64,

    #[serde(default)]
    pub transfers: Vec<TransferRecord>,

    #[serde(default)]
    pub reservations: Vec<ReservationRecord>,

    #[serde(default)]
    pub swaps: Vec<SwapRecord>,

    #[serde(default)]
    pub price_changes: Vec<PriceChangeRecord>,

    #[serde(default)]
    pub pool_events: Vec<PoolEventRecord>,

    #[serde(default)]
    pub staking_events: Vec<StakingEventRecord>,
}

/// An OP20 transfer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub tx_hash: String,
    pub block_height: u64,
    pub contract: String,

    /// Sender identity hash.
    pub from: String,

    /// Receiver identity hash.
    pub to: String,

    /// Token units, decimal string.
    pub value: String,

    /// Set when the contract behaves as an NFT collection.
    #[serde(default)]
    pub is_nft: bool,
}

/// A NativeSwap liquidity reservation. The provider side is an identity
/// hash; the buyer side may be a plain BTC address.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRecord {
    pub tx_hash: String,
    pub block_height: u64,
    pub contract: String,

    pub provider: String,

    pub buyer: String,

    /// Reserved BTC, decimal string of satoshis.
    pub satoshis: String,

    /// Reserved tokens, decimal string.
    pub token_amount: String,
}

/// One provider fill consumed by a swap.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFill {
    pub provider: String,
    pub satoshis: String,
    pub token_amount: String,
}

/// An executed NativeSwap trade. `btc_spent` already nets the change, so
/// raw BTC movement in the same transaction is plumbing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecord {
    pub tx_hash: String,
    pub block_height: u64,
    pub contract: String,

    pub buyer: String,

    pub btc_spent: String,

    pub tokens_received: String,

    /// Liquidity providers whose queue positions this swap consumed.
    #[serde(default)]
    pub providers: Vec<ProviderFill>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChangeRecord {
    pub contract: String,
    pub block_height: u64,

    pub previous_price: String,
    pub new_price: String,

    /// Signed percent move since the previous price point.
    pub change_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolEventKind {
    Add,
    Remove,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEventRecord {
    pub tx_hash: String,
    pub block_height: u64,
    pub contract: String,

    pub provider: String,

    #[serde(rename = "type")]
    pub kind: PoolEventKind,

    pub satoshis: String,
    pub token_amount: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakingEventKind {
    Stake,
    Unstake,
    Claim,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingEventRecord {
    pub tx_hash: String,
    pub block_height: u64,
    pub contract: String,

    pub staker: String,

    #[serde(rename = "type")]
    pub kind: StakingEventKind,

    /// Token units, decimal string.
    pub amount: String,
}

/// One entry of `GET /balances/{address}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub contract: String,

    /// Token units, decimal string.
    pub amount: String,

    #[serde(default)]
    pub symbol: Option<String>,

    #[serde(default)]
    pub decimals: Option<u8>,
}

/// `GET /listings/{contract}`: the NativeSwap provider queues.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listings {
    #[serde(default)]
    pub priority: Vec<ProviderListing>,

    #[serde(default)]
    pub standard: Vec<ProviderListing>,

    #[serde(default)]
    pub priority_count: u64,

    #[serde(default)]
    pub standard_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderListing {
    pub provider: String,
    pub token_amount: String,
}

/// `GET /prices/{contract}`: current virtual reserves plus recent moves.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prices {
    pub virtual_btc_reserve: String,
    pub virtual_token_reserve: String,

    #[serde(default)]
    pub history: Vec<PriceChangeRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_batch_deserialize() {
        let json = r#"{
            "lastIndexedBlock": 200,
            "since": 101,
            "transfers": [{
                "txHash": "0xT1", "blockHeight": 200, "contract": "op1c",
                "from": "0xaa", "to": "0xbb", "value": "1000000000000"
            }],
            "swaps": [{
                "txHash": "0xT1", "blockHeight": 200, "contract": "op1c",
                "buyer": "0xbb", "btcSpent": "50000", "tokensReceived": "1000000000000",
                "providers": [{"provider": "0xcc", "satoshis": "50000", "tokenAmount": "1000000000000"}]
            }],
            "priceChanges": [{
                "contract": "op1c", "blockHeight": 200,
                "previousPrice": "100", "newPrice": "112", "changePercent": 12.0
            }]
        }"#;
        let batch: EventsBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.last_indexed_block, 200);
        assert_eq!(batch.transfers.len(), 1);
        assert!(!batch.transfers[0].is_nft);
        assert_eq!(batch.swaps[0].providers[0].provider, "0xcc");
        assert!(batch.reservations.is_empty());
        assert!(batch.pool_events.is_empty());
        assert_eq!(batch.price_changes[0].change_percent, 12.0);
    }

    #[test]
    fn test_tagged_kinds() {
        let pool: PoolEventRecord = serde_json::from_str(
            r#"{"txHash": "t", "blockHeight": 1, "contract": "c",
                "provider": "0xaa", "type": "remove",
                "satoshis": "10", "tokenAmount": "20"}"#,
        )
        .unwrap();
        assert_eq!(pool.kind, PoolEventKind::Remove);

        let staking: StakingEventRecord = serde_json::from_str(
            r#"{"txHash": "t", "blockHeight": 1, "contract": "c",
                "staker": "0xaa", "type": "claim", "amount": "5"}"#,
        )
        .unwrap();
        assert_eq!(staking.kind, StakingEventKind::Claim);
    }
}
