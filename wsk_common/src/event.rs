use serde::{Deserialize, Serialize};

/// Direction of a token movement relative to the tracked wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Which side of a liquidity reservation the tracked wallet is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationRole {
    Buyer,
    Seller,
}

/// A semantic wallet event, attributed to the primary address of a
/// subscription. Produced by the block scanner and the indexer matcher,
/// merged and filtered by the pipeline, rendered by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEvent {
    /// Primary address of the subscription this event attributes to.
    pub address: String,

    /// Hash of the transaction that caused the event.
    pub tx_hash: String,

    /// Height of the block containing the transaction.
    pub block_height: u64,

    /// Contract involved, when the event is contract-level.
    pub contract: Option<String>,

    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A tracked UTXO was spent (confirmed via the UTXO map), or an inferred
    /// send was promoted by the pipeline.
    BtcSent {
        satoshis: u64,
        /// First output address not belonging to the tracked set.
        counterparty: Option<String>,
        /// Value of the counterparty output (confirmed spends) or the sum of
        /// all non-tracked outputs (promoted inferred sends).
        recipient_amount: Option<u64>,
    },

    /// An output of the transaction pays a tracked address.
    BtcReceived { satoshis: u64 },

    /// Fungible token transfer.
    Token { direction: Direction, amount: u128 },

    /// Transfer on a contract in the wallet's seen-NFT set.
    NftTransfer { direction: Direction, amount: u128 },

    /// A NativeSwap liquidity reservation involving the wallet.
    LiquidityReserved {
        role: ReservationRole,
        satoshis: u64,
        token_amount: u128,
    },

    /// The wallet's provider liquidity was consumed by a swap.
    ProviderConsumed { satoshis: u64, token_amount: u128 },

    /// A NativeSwap swap executed by the wallet. `btc_spent` is the net cost.
    SwapExecuted { btc_spent: u64, tokens_received: u128 },

    LiquidityAdded { satoshis: u64, token_amount: u128 },
    LiquidityRemoved { satoshis: u64, token_amount: u128 },

    Staked { amount: u128 },
    Unstaked { amount: u128 },
    RewardsClaimed { amount: u128 },
}

impl EventKind {
    /// Stable name used for dedup keys and logging.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::BtcSent { .. } => "btc_sent",
            EventKind::BtcReceived { .. } => "btc_received",
            EventKind::Token { .. } => "token",
            EventKind::NftTransfer { .. } => "nft_transfer",
            EventKind::LiquidityReserved { .. } => "liquidity_reserved",
            EventKind::ProviderConsumed { .. } => "provider_consumed",
            EventKind::SwapExecuted { .. } => "swap_executed",
            EventKind::LiquidityAdded { .. } => "liquidity_added",
            EventKind::LiquidityRemoved { .. } => "liquidity_removed",
            EventKind::Staked { .. } => "staked",
            EventKind::Unstaked { .. } => "unstaked",
            EventKind::RewardsClaimed { .. } => "rewards_claimed",
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            EventKind::Token { direction, .. } | EventKind::NftTransfer { direction, .. } => {
                Some(*direction)
            }
            _ => None,
        }
    }

    /// Whether this is raw BTC movement, subject to cross-source suppression.
    pub fn is_btc(&self) -> bool {
        matches!(self, EventKind::BtcSent { .. } | EventKind::BtcReceived { .. })
    }
}

impl WalletEvent {
    /// Key for cross-source deduplication: two events with the same key are
    /// the same fact reported twice.
    pub fn dedup_key(&self) -> (String, String, String, Option<String>, Option<Direction>) {
        (
            self.kind.name().to_string(),
            self.tx_hash.clone(),
            self.address.clone(),
            self.contract.clone(),
            self.kind.direction(),
        )
    }
}

/// Candidate send detected from the output side only, for chains whose block
/// inputs omit address data. Promoted to [`EventKind::BtcSent`] by the
/// pipeline when the UTXO path produced no confirmed spend for the same tx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredSend {
    /// Primary address that received change in the transaction.
    pub address: String,

    pub tx_hash: String,
    pub block_height: u64,

    /// Sum of all outputs not belonging to the tracked set.
    pub total_sent: u64,

    /// First non-tracked output address.
    pub counterparty: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> WalletEvent {
        WalletEvent {
            address: "addr".to_string(),
            tx_hash: "txh".to_string(),
            block_height: 10,
            contract: None,
            kind,
        }
    }

    #[test]
    fn test_dedup_key_distinguishes_direction() {
        let inbound = event(EventKind::Token {
            direction: Direction::In,
            amount: 1,
        });
        let outbound = event(EventKind::Token {
            direction: Direction::Out,
            amount: 1,
        });
        assert_ne!(inbound.dedup_key(), outbound.dedup_key());
    }

    #[test]
    fn test_dedup_key_ignores_amounts() {
        let small = event(EventKind::BtcReceived { satoshis: 1 });
        let big = event(EventKind::BtcReceived { satoshis: 2 });
        assert_eq!(small.dedup_key(), big.dedup_key());
    }

    #[test]
    fn test_is_btc() {
        assert!(event(EventKind::BtcReceived { satoshis: 1 }).kind.is_btc());
        assert!(!event(EventKind::Staked { amount: 1 }).kind.is_btc());
    }

    #[test]
    fn test_kind_serde_tag() {
        let e = event(EventKind::SwapExecuted {
            btc_spent: 50_000,
            tokens_received: 1_000_000_000_000,
        });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"]["type"], "swap_executed");
        let back: WalletEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }
}
