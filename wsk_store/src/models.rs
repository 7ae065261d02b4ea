use crate::Error;
use once_cell::sync::Lazy;
use rand::distributions::Slice;
use rand::Rng;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use wsk_common::{Linkage, Timestamp};

/// Alphabet for opaque short ids: lowercase alphanumerics, no look-alikes
/// excluded on purpose since ids are never typed from paper.
const ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub(crate) const SHORT_ID_LEN: usize = 8;

/// Generate an opaque 8-character id. Uniqueness is enforced by the caller
/// against the live collection.
pub(crate) fn new_short_id<R: Rng>(rng: &mut R) -> String {
    let dist = Slice::new(&ID_ALPHABET).expect("alphabet is non-empty");
    rng.sample_iter(dist).take(SHORT_ID_LEN).collect()
}

/// A chat's watch on one wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Opaque short id, unique across all chats.
    pub id: String,

    /// Telegram chat the subscription belongs to.
    pub chat_id: i64,

    /// The address exactly as the user supplied it; notifications attribute
    /// to this form.
    pub address: String,

    /// Human label shown in notifications and listings.
    pub label: String,

    pub created_at: Timestamp,

    /// Identity bundle, filled in by the resolver once it succeeds.
    pub linkage: Option<Linkage>,
}

/// Kind of contract a token watch points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Fungible,
    Nft,
}

/// A chat-level watch on a specific contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenWatch {
    /// Opaque short id, unique across all chats.
    pub id: String,

    pub chat_id: i64,

    pub contract: String,

    pub label: String,

    pub kind: TokenKind,

    /// Price-change alert threshold in percent. 0 disables price alerts.
    pub price_alert_percent: f64,

    /// Minimum reservation size worth alerting on, in satoshis. 0 disables.
    pub min_reservation_sats: u64,
}

/// A chat that passed the legacy password gate or redeemed a code.
///
/// Presence here is necessary but not sufficient to receive notifications; a
/// live [`PaidSubscription`] is the gating condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedChat {
    pub chat_id: i64,
    pub authorized_at: Timestamp,
}

/// Per-chat paid access. A chat is live iff `now < expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidSubscription {
    pub chat_id: i64,
    pub expires_at: Timestamp,

    /// The access code that was redeemed for this subscription.
    pub code: String,

    /// The wallet that funded the code, when the payment pipeline knows it.
    pub paid_by: Option<String>,
}

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^JT-[A-Z0-9]{12}$").expect("valid regex literal"));

/// A structured access token minted by the payment pipeline and consumed by
/// redeem. Redeemable at most once; redemption is idempotent for the chat
/// that redeemed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    /// The token itself, `JT-` followed by 12 uppercase alphanumerics.
    pub code: String,

    pub redeemed: bool,

    /// Chat that redeemed the code, if any.
    pub redeemed_by: Option<i64>,

    /// The code itself expires if unused past this time.
    pub expires_at: Timestamp,

    /// Length of the paid subscription this code grants.
    pub duration_days: u32,

    /// Hash of the transaction that funded the code, for the unique index.
    pub funding_txid: Option<String>,
}

impl AccessCode {
    /// Check the `JT-[A-Z0-9]{12}` syntax without touching the store.
    pub fn validate_syntax(code: &str) -> Result<(), Error> {
        if CODE_RE.is_match(code) {
            Ok(())
        } else {
            Err(Error::MalformedCode)
        }
    }
}

/// The contracts ever observed interacting with one tracked identity.
///
/// Bounds which contract balances the on-demand queries hit and which
/// contracts are treated as NFT collections when formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenContracts {
    pub address: String,

    pub contracts: BTreeSet<String>,

    /// Subset of `contracts` observed behaving as NFT collections.
    pub nft_contracts: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_shape() {
        let mut rng = rand::thread_rng();
        let id = new_short_id(&mut rng);
        assert_eq!(id.len(), SHORT_ID_LEN);
        assert!(id.chars().all(|c| ID_ALPHABET.contains(&c)));
    }

    #[test]
    fn test_access_code_syntax() {
        assert!(AccessCode::validate_syntax("JT-ABC123DEF456").is_ok());
        assert!(AccessCode::validate_syntax("JT-abc123def456").is_err());
        assert!(AccessCode::validate_syntax("JT-SHORT").is_err());
        assert!(AccessCode::validate_syntax("XX-ABC123DEF456").is_err());
        assert!(AccessCode::validate_syntax("JT-ABC123DEF4567").is_err());
    }

    #[test]
    fn test_subscription_serde() {
        let sub = Subscription {
            id: "a1b2c3d4".to_string(),
            chat_id: -100123,
            address: "bc1qexample".to_string(),
            label: "treasury".to_string(),
            created_at: 1_700_000_000,
            linkage: None,
        };
        let json = serde_json::to_string(&sub).unwrap();
        let back: Subscription = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sub);
    }
}
