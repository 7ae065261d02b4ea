use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// The 32-byte chain-level identity of a wallet: the hash of its serialized
/// key-material record. Every address form a wallet appears under on chain
/// derives from the same record, so this hash is the canonical cross-format
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MldsaHash([u8; 32]);

impl MldsaHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        MldsaHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether an indexer actor field refers to this identity.
    ///
    /// Actor fields arrive as hex with or without a `0x` prefix and in either
    /// case; comparison is on the normalized form.
    pub fn matches_actor(&self, actor: &str) -> bool {
        strip_hex_prefix(actor).eq_ignore_ascii_case(&self.to_string())
    }
}

impl fmt::Display for MldsaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for MldsaHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = strip_hex_prefix(s);
        let bytes = hex::decode(stripped).map_err(|_| Error::InvalidIdentityHash(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidIdentityHash(s.to_string()))?;
        Ok(MldsaHash(arr))
    }
}

impl Serialize for MldsaHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MldsaHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Strip an optional `0x`/`0X` prefix from a hex string.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// A reference to a transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction id, lowercase hex as the RPC returns it.
    pub txid: String,

    /// Output index within the transaction.
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        OutPoint {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for OutPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, vout) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidOutPoint(s.to_string()))?;
        let vout = vout
            .parse()
            .map_err(|_| Error::InvalidOutPoint(s.to_string()))?;
        Ok(OutPoint::new(txid, vout))
    }
}

/// Value of the UTXO map: which tracked primary owns an unspent output and
/// how many satoshis it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedUtxo {
    /// Canonical primary address of the subscription the output belongs to.
    pub address: String,

    /// Satoshi value, always positive.
    pub value: u64,
}

/// Every address form derivable from a wallet's identity record.
///
/// Each form is optional: deriving `p2wpkh`/`p2pkh` requires the original
/// public key which may not be on chain, `p2tr` requires the tweaked key,
/// and `csv1` requires a dedicated RPC round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linkage {
    /// The chain-level identity, always present once resolution succeeded.
    pub mldsa_hash: MldsaHash,

    /// Tweaked x-only public key, lowercase hex, when the chain exposes it.
    pub tweaked_pubkey: Option<String>,

    pub p2op: Option<String>,
    pub p2tr: Option<String>,
    pub p2wpkh: Option<String>,
    pub p2pkh: Option<String>,

    /// The timelocked form, resolved through a dedicated RPC path.
    pub csv1: Option<String>,
}

impl Linkage {
    pub fn new(mldsa_hash: MldsaHash) -> Self {
        Linkage {
            mldsa_hash,
            tweaked_pubkey: None,
            p2op: None,
            p2tr: None,
            p2wpkh: None,
            p2pkh: None,
            csv1: None,
        }
    }

    /// All the address forms present in this linkage.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        [
            self.p2op.as_deref(),
            self.p2tr.as_deref(),
            self.p2wpkh.as_deref(),
            self.p2pkh.as_deref(),
            self.csv1.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// The three projections the hot matching paths need, rebuilt from the
/// subscription set once per tick.
///
/// * `tracked` answers "is this address one of ours" for any linked form;
/// * `mldsa_by_primary` is keyed only by primary so indexer events attribute
///   to the subscription address, never to an alias;
/// * `canonical` maps any linked alias back to its primary.
#[derive(Debug, Clone, Default)]
pub struct IdentityProjection {
    pub tracked: HashSet<String>,
    pub mldsa_by_primary: HashMap<String, MldsaHash>,
    pub canonical: HashMap<String, String>,
}

impl IdentityProjection {
    /// Whether `address` is a primary or any linked form of one.
    pub fn is_tracked(&self, address: &str) -> bool {
        self.tracked.contains(address)
    }

    /// The primary address `address` attributes to, falling back to the
    /// address itself when it is not a known alias.
    pub fn canonicalize<'a>(&'a self, address: &'a str) -> &'a str {
        self.canonical
            .get(address)
            .map(String::as_str)
            .unwrap_or(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_HEX: &str = "aa04bdd30e0f7bb4dfa1c27d1a9d3d79c78ffd9ab7c78c978d0bd2742e837e01";

    #[test]
    fn test_mldsa_hash_parse() {
        let h: MldsaHash = HASH_HEX.parse().unwrap();
        assert_eq!(h.to_string(), HASH_HEX);

        let prefixed: MldsaHash = format!("0x{HASH_HEX}").parse().unwrap();
        assert_eq!(prefixed, h);

        let upper: MldsaHash = HASH_HEX.to_uppercase().parse().unwrap();
        assert_eq!(upper, h);

        assert!("abcd".parse::<MldsaHash>().is_err());
        assert!("zz04bdd30e0f7bb4dfa1c27d1a9d3d79c78ffd9ab7c78c978d0bd2742e837e01"
            .parse::<MldsaHash>()
            .is_err());
    }

    #[test]
    fn test_mldsa_hash_matches_actor() {
        let h: MldsaHash = HASH_HEX.parse().unwrap();
        assert!(h.matches_actor(HASH_HEX));
        assert!(h.matches_actor(&format!("0x{}", HASH_HEX.to_uppercase())));
        assert!(!h.matches_actor("0xdead"));
    }

    #[test]
    fn test_mldsa_hash_serde() {
        let h: MldsaHash = HASH_HEX.parse().unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{HASH_HEX}\""));
        let back: MldsaHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_outpoint_roundtrip() {
        let op = OutPoint::new("ab".repeat(32), 7);
        let s = op.to_string();
        assert_eq!(s.parse::<OutPoint>().unwrap(), op);
        assert!("missing-vout".parse::<OutPoint>().is_err());
    }

    #[test]
    fn test_linkage_addresses() {
        let mut linkage = Linkage::new(HASH_HEX.parse().unwrap());
        assert_eq!(linkage.addresses().count(), 0);
        linkage.p2tr = Some("bc1p...".to_string());
        linkage.csv1 = Some("bc1q...csv".to_string());
        let forms: Vec<_> = linkage.addresses().collect();
        assert_eq!(forms, vec!["bc1p...", "bc1q...csv"]);
    }

    #[test]
    fn test_projection_canonicalize() {
        let mut projection = IdentityProjection::default();
        projection.tracked.insert("primary".to_string());
        projection.tracked.insert("alias".to_string());
        projection
            .canonical
            .insert("alias".to_string(), "primary".to_string());

        assert_eq!(projection.canonicalize("alias"), "primary");
        assert_eq!(projection.canonicalize("primary"), "primary");
        assert_eq!(projection.canonicalize("unknown"), "unknown");
    }
}
