//! Cross-format identity resolution.
//!
//! A wallet shows up on chain under one address per key-derivation form, all
//! rooted in the same owner record. Resolution asks the node for that record
//! once and derives every form we can, so the hot matching paths downstream
//! are plain set lookups.

use crate::model::OwnerInfo;
use crate::rpc::RpcClient;
use crate::Error;
use bitcoin::key::{CompressedPublicKey, TweakedPublicKey, XOnlyPublicKey};
use bitcoin::{Address, PublicKey};
use wsk_common::{Linkage, MldsaHash, Network};

fn bitcoin_network(network: Network) -> bitcoin::Network {
    match network {
        Network::Mainnet => bitcoin::Network::Bitcoin,
        Network::Testnet => bitcoin::Network::Testnet,
        Network::Regtest => bitcoin::Network::Regtest,
    }
}

/// Resolve the full identity bundle behind `address`.
///
/// Returns `None` when the chain has no owner record for the address (it
/// never transacted). Each address-form derivation can fail independently —
/// legacy forms need the original public key, which may not be on chain —
/// and a failed form is simply absent from the result.
pub async fn resolve(
    rpc: &RpcClient,
    network: Network,
    address: &str,
) -> Result<Option<Linkage>, Error> {
    let Some(info) = rpc.public_key_info(address).await? else {
        return Ok(None);
    };

    let mldsa_hash: MldsaHash = match info.mldsa_hash.parse() {
        Ok(hash) => hash,
        Err(e) => {
            log::warn!("owner record for {address} has malformed hash: {e}");
            return Ok(None);
        }
    };

    let mut linkage = Linkage::new(mldsa_hash);
    linkage.tweaked_pubkey = info.tweaked_pubkey.clone();
    linkage.p2op = derive_p2op(network, &mldsa_hash);
    linkage.p2tr = derive_p2tr(network, &info);
    (linkage.p2wpkh, linkage.p2pkh) = derive_legacy(network, &info);

    match rpc.csv1_address(address).await {
        Ok(csv1) => linkage.csv1 = csv1.map(|c| c.address),
        // the rest of the bundle is still worth caching
        Err(e) => log::debug!("csv1 lookup failed for {address}: {e}"),
    }

    Ok(Some(linkage))
}

/// The chain-native form: bech32m over the identity hash itself.
fn derive_p2op(network: Network, hash: &MldsaHash) -> Option<String> {
    let hrp = bech32::Hrp::parse(network.p2op_hrp()).ok()?;
    bech32::encode::<bech32::Bech32m>(hrp, hash.as_bytes()).ok()
}

fn derive_p2tr(network: Network, info: &OwnerInfo) -> Option<String> {
    let bytes = hex::decode(info.tweaked_pubkey.as_deref()?).ok()?;
    let xonly = XOnlyPublicKey::from_slice(&bytes).ok()?;
    let tweaked = TweakedPublicKey::dangerous_assume_tweaked(xonly);
    Some(Address::p2tr_tweaked(tweaked, bitcoin_network(network)).to_string())
}

/// Segwit-v0 and base58 forms, both requiring the original public key.
fn derive_legacy(network: Network, info: &OwnerInfo) -> (Option<String>, Option<String>) {
    let Some(key_hex) = info.public_key.as_deref() else {
        return (None, None);
    };
    let Ok(bytes) = hex::decode(key_hex) else {
        return (None, None);
    };
    let p2wpkh = CompressedPublicKey::from_slice(&bytes)
        .ok()
        .map(|pk| Address::p2wpkh(&pk, bitcoin_network(network)).to_string());
    let p2pkh = PublicKey::from_slice(&bytes)
        .ok()
        .map(|pk| Address::p2pkh(&pk, bitcoin_network(network)).to_string());
    (p2wpkh, p2pkh)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "aa04bdd30e0f7bb4dfa1c27d1a9d3d79c78ffd9ab7c78c978d0bd2742e837e01";
    // The BIP-173 example key (the secp256k1 generator point) and the
    // addresses it derives to on mainnet.
    const GENERATOR_KEY: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const GENERATOR_P2WPKH: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const GENERATOR_P2PKH: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";

    fn info(tweaked: Option<&str>, public: Option<&str>) -> OwnerInfo {
        OwnerInfo {
            mldsa_hash: HASH.to_string(),
            tweaked_pubkey: tweaked.map(str::to_string),
            public_key: public.map(str::to_string),
        }
    }

    #[test]
    fn test_derive_legacy_forms() {
        let (p2wpkh, p2pkh) = derive_legacy(Network::Mainnet, &info(None, Some(GENERATOR_KEY)));
        assert_eq!(p2wpkh.as_deref(), Some(GENERATOR_P2WPKH));
        assert_eq!(p2pkh.as_deref(), Some(GENERATOR_P2PKH));
    }

    #[test]
    fn test_missing_public_key_absorbs_forms() {
        let (p2wpkh, p2pkh) = derive_legacy(Network::Mainnet, &info(None, None));
        assert!(p2wpkh.is_none());
        assert!(p2pkh.is_none());

        let (p2wpkh, p2pkh) = derive_legacy(Network::Mainnet, &info(None, Some("zz")));
        assert!(p2wpkh.is_none());
        assert!(p2pkh.is_none());
    }

    #[test]
    fn test_derive_p2tr_needs_valid_xonly_key() {
        // an x-coordinate of a known point is a valid x-only key
        let xonly = &GENERATOR_KEY[2..];
        let addr = derive_p2tr(Network::Mainnet, &info(Some(xonly), None)).unwrap();
        assert!(addr.starts_with("bc1p"));

        assert!(derive_p2tr(Network::Mainnet, &info(None, None)).is_none());
        assert!(derive_p2tr(Network::Mainnet, &info(Some("beef"), None)).is_none());
    }

    #[test]
    fn test_derive_p2op_roundtrip() {
        let hash: MldsaHash = HASH.parse().unwrap();
        let addr = derive_p2op(Network::Testnet, &hash).unwrap();
        assert!(addr.starts_with("topb1"));

        let (hrp, bytes) = bech32::decode(&addr).unwrap();
        assert_eq!(hrp.as_str(), "topb");
        assert_eq!(bytes, hash.as_bytes());
    }

    #[test]
    fn test_networks_give_distinct_p2op() {
        let hash: MldsaHash = HASH.parse().unwrap();
        let mainnet = derive_p2op(Network::Mainnet, &hash).unwrap();
        let regtest = derive_p2op(Network::Regtest, &hash).unwrap();
        assert_ne!(mainnet, regtest);
        assert!(mainnet.starts_with("opb1"));
        assert!(regtest.starts_with("ropb1"));
    }
}
