//! Wire types of the chain RPC, kept close to the JSON the node emits.

use serde::Deserialize;
use std::collections::HashMap;

/// A block with full transactions, as returned by `btc_getBlockByNumber`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub height: u64,

    #[serde(default)]
    pub hash: Option<String>,

    #[serde(default)]
    pub transactions: Vec<BlockTx>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTx {
    pub hash: String,

    /// Sender hint, present on contract interactions only.
    #[serde(default)]
    pub from: Option<String>,

    #[serde(default)]
    pub inputs: Vec<TxInput>,

    #[serde(default)]
    pub outputs: Vec<TxOutput>,

    /// Contract events keyed by contract address. Opaque at this layer; the
    /// indexer is the semantic source for contract activity.
    #[serde(default)]
    pub events: HashMap<String, Vec<ContractEvent>>,
}

/// One transaction input. Some networks expose inputs without address data,
/// in which case spend detection relies entirely on the stored UTXO map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    #[serde(default)]
    pub original_transaction_id: Option<String>,

    #[serde(default)]
    pub output_transaction_index: Option<u32>,

    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    #[serde(default)]
    pub script_pub_key: Option<ScriptPubKey>,

    pub value: u64,

    pub index: u32,
}

impl TxOutput {
    pub fn address(&self) -> Option<&str> {
        self.script_pub_key.as_ref()?.address.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptPubKey {
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// The owner-info record of an address: the key material the chain has on
/// file for the identity behind it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerInfo {
    /// Hash of the serialized owner record, lowercase hex. The chain-level
    /// identity of the wallet.
    pub mldsa_hash: String,

    /// Tweaked x-only key, present for identities that ever signed.
    #[serde(default)]
    pub tweaked_pubkey: Option<String>,

    /// Original compressed public key, only when it appeared on chain and
    /// `includePublicKey` was requested.
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcUtxo {
    pub transaction_id: String,

    pub output_index: u32,

    pub value: u64,
}

/// Result shape of `btc_getCSV1ForAddress`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Csv1Address {
    pub address: String,
}
