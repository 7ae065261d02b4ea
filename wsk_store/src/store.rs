use crate::models::{
    new_short_id, AccessCode, AuthorizedChat, PaidSubscription, SeenContracts, Subscription,
    TokenKind, TokenWatch,
};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use wsk_common::{
    DocumentStore, Height, IdentityProjection, Linkage, MldsaHash, OutPoint, Timestamp,
    TrackedUtxo,
};

const SUBSCRIPTIONS: &str = "subscriptions";
const TOKEN_WATCHES: &str = "token_watches";
const UTXOS: &str = "utxos";
const AUTHORIZED: &str = "authorized_chats";
const CODES: &str = "access_codes";
const PAID: &str = "paid_subscriptions";
const SEEN: &str = "seen_contracts";
const STATE: &str = "state";

/// Persisted form of one tracked UTXO.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UtxoDoc {
    txid: String,
    vout: u32,
    value: u64,
    address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorDoc {
    value: Height,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AddressSetDoc {
    addresses: Vec<String>,
}

#[derive(Default)]
struct Cache {
    subscriptions: HashMap<String, Subscription>,
    token_watches: HashMap<String, TokenWatch>,
    utxos: HashMap<OutPoint, TrackedUtxo>,
    authorized: HashMap<i64, AuthorizedChat>,
    codes: HashMap<String, AccessCode>,
    paid: HashMap<i64, PaidSubscription>,
    seen: HashMap<String, SeenContracts>,
    cursor: Height,
    utxo_seeded: HashSet<String>,
    history_scanned: HashSet<String>,
}

/// Durable state of the service: subscriptions, identity linkages, the UTXO
/// set, access control and the scan cursor.
///
/// Every collection is hydrated from the backing [`DocumentStore`] at open
/// and kept coherent by write-through on every mutation: the document write
/// happens first, the cache mutation second, so a failed write leaves the
/// cache (and thus the next tick) on the previous consistent state. All
/// reads are served from the cache.
pub struct Store {
    persister: Arc<dyn DocumentStore>,
    cache: Mutex<Cache>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "Store({:?})", self.persister)
    }
}

impl Store {
    /// Hydrate every collection and verify the uniqueness constraints.
    ///
    /// An unreadable document or a violated constraint is fatal: this store
    /// is the only writer, so either means the backing data is corrupt.
    pub fn open(persister: Arc<dyn DocumentStore>) -> Result<Self, Error> {
        let mut cache = Cache::default();

        let mut by_chat_addr = HashSet::new();
        for (id, bytes) in persister.list(SUBSCRIPTIONS)? {
            let sub: Subscription = serde_json::from_slice(&bytes)?;
            if !by_chat_addr.insert((sub.chat_id, sub.address.clone())) {
                return Err(Error::Generic(format!(
                    "duplicate subscription for chat {} address {}",
                    sub.chat_id, sub.address
                )));
            }
            cache.subscriptions.insert(id, sub);
        }

        let mut by_chat_contract = HashSet::new();
        for (id, bytes) in persister.list(TOKEN_WATCHES)? {
            let watch: TokenWatch = serde_json::from_slice(&bytes)?;
            if !by_chat_contract.insert((watch.chat_id, watch.contract.clone())) {
                return Err(Error::Generic(format!(
                    "duplicate token watch for chat {} contract {}",
                    watch.chat_id, watch.contract
                )));
            }
            cache.token_watches.insert(id, watch);
        }

        for (id, bytes) in persister.list(UTXOS)? {
            let doc: UtxoDoc = serde_json::from_slice(&bytes)?;
            let outpoint = OutPoint::new(doc.txid, doc.vout);
            debug_assert_eq!(id, outpoint.to_string());
            cache.utxos.insert(
                outpoint,
                TrackedUtxo {
                    address: doc.address,
                    value: doc.value,
                },
            );
        }

        for (_, bytes) in persister.list(AUTHORIZED)? {
            let chat: AuthorizedChat = serde_json::from_slice(&bytes)?;
            cache.authorized.insert(chat.chat_id, chat);
        }

        let mut by_funding_txid = HashSet::new();
        for (_, bytes) in persister.list(CODES)? {
            let code: AccessCode = serde_json::from_slice(&bytes)?;
            if let Some(txid) = &code.funding_txid {
                if !by_funding_txid.insert(txid.clone()) {
                    return Err(Error::Generic(format!(
                        "duplicate access code funding tx {txid}"
                    )));
                }
            }
            cache.codes.insert(code.code.clone(), code);
        }

        for (_, bytes) in persister.list(PAID)? {
            let paid: PaidSubscription = serde_json::from_slice(&bytes)?;
            cache.paid.insert(paid.chat_id, paid);
        }

        for (_, bytes) in persister.list(SEEN)? {
            let seen: SeenContracts = serde_json::from_slice(&bytes)?;
            cache.seen.insert(seen.address.clone(), seen);
        }

        if let Some(bytes) = persister.get(STATE, "cursor")? {
            let doc: CursorDoc = serde_json::from_slice(&bytes)?;
            cache.cursor = doc.value;
        }
        if let Some(bytes) = persister.get(STATE, "utxo_seeded")? {
            let doc: AddressSetDoc = serde_json::from_slice(&bytes)?;
            cache.utxo_seeded = doc.addresses.into_iter().collect();
        }
        if let Some(bytes) = persister.get(STATE, "history_scanned")? {
            let doc: AddressSetDoc = serde_json::from_slice(&bytes)?;
            cache.history_scanned = doc.addresses.into_iter().collect();
        }

        log::debug!(
            "store hydrated: {} subscriptions, {} utxos, {} token watches",
            cache.subscriptions.len(),
            cache.utxos.len(),
            cache.token_watches.len()
        );

        Ok(Store {
            persister,
            cache: Mutex::new(cache),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().expect("cache lock poisoned")
    }

    fn put_doc<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(doc)?;
        self.persister.put(collection, id, &bytes)?;
        Ok(())
    }

    fn put_address_set(&self, id: &str, set: &HashSet<String>) -> Result<(), Error> {
        let mut addresses: Vec<String> = set.iter().cloned().collect();
        addresses.sort();
        self.put_doc(STATE, id, &AddressSetDoc { addresses })
    }

    // --- Subscriptions ---

    /// Create a subscription for `chat_id` on `address`.
    ///
    /// Rejected when the chat already tracks the address, when the resolved
    /// identity is already tracked by the chat under another address format,
    /// or when the chat is at its wallet limit.
    pub fn track(
        &self,
        chat_id: i64,
        address: &str,
        label: &str,
        linkage: Option<Linkage>,
        max_per_chat: usize,
        now: Timestamp,
    ) -> Result<Subscription, Error> {
        let mut cache = self.lock();

        let mut chat_subs = 0;
        for sub in cache.subscriptions.values() {
            if sub.chat_id != chat_id {
                continue;
            }
            chat_subs += 1;
            if sub.address == address {
                return Err(Error::AlreadyTracking {
                    address: sub.address.clone(),
                });
            }
            if let (Some(new), Some(existing)) = (&linkage, &sub.linkage) {
                if new.mldsa_hash == existing.mldsa_hash {
                    return Err(Error::AlreadyTracking {
                        address: sub.address.clone(),
                    });
                }
            }
        }
        if chat_subs >= max_per_chat {
            return Err(Error::WalletLimitReached(max_per_chat));
        }

        let mut rng = rand::thread_rng();
        let mut id = new_short_id(&mut rng);
        while cache.subscriptions.contains_key(&id) {
            id = new_short_id(&mut rng);
        }

        let sub = Subscription {
            id: id.clone(),
            chat_id,
            address: address.to_string(),
            label: label.to_string(),
            created_at: now,
            linkage,
        };
        self.put_doc(SUBSCRIPTIONS, &id, &sub)?;
        cache.subscriptions.insert(id, sub.clone());
        Ok(sub)
    }

    /// Delete a chat's subscription and garbage-collect per-address state no
    /// other subscription still needs.
    pub fn untrack(&self, chat_id: i64, sub_id: &str) -> Result<Subscription, Error> {
        let mut cache = self.lock();
        let sub = match cache.subscriptions.get(sub_id) {
            Some(sub) if sub.chat_id == chat_id => sub.clone(),
            _ => return Err(Error::SubscriptionNotFound(sub_id.to_string())),
        };

        self.persister.delete(SUBSCRIPTIONS, sub_id)?;
        cache.subscriptions.remove(sub_id);

        let still_tracked = cache
            .subscriptions
            .values()
            .any(|s| s.address == sub.address);
        if !still_tracked {
            let stale: Vec<OutPoint> = cache
                .utxos
                .iter()
                .filter(|(_, u)| u.address == sub.address)
                .map(|(op, _)| op.clone())
                .collect();
            for outpoint in &stale {
                self.persister.delete(UTXOS, &outpoint.to_string())?;
                cache.utxos.remove(outpoint);
            }
            if cache.utxo_seeded.contains(&sub.address) {
                let mut seeded = cache.utxo_seeded.clone();
                seeded.remove(&sub.address);
                self.put_address_set("utxo_seeded", &seeded)?;
                cache.utxo_seeded = seeded;
            }
            if cache.history_scanned.contains(&sub.address) {
                let mut scanned = cache.history_scanned.clone();
                scanned.remove(&sub.address);
                self.put_address_set("history_scanned", &scanned)?;
                cache.history_scanned = scanned;
            }
        }
        Ok(sub)
    }

    pub fn subscriptions(&self, chat_id: i64) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self
            .lock()
            .subscriptions
            .values()
            .filter(|s| s.chat_id == chat_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        subs
    }

    /// Subscriptions whose primary is exactly `address`, across all chats.
    pub fn subscriptions_for_address(&self, address: &str) -> Vec<Subscription> {
        self.lock()
            .subscriptions
            .values()
            .filter(|s| s.address == address)
            .cloned()
            .collect()
    }

    /// The subscription of `chat_id` whose linkage carries `hash`, if any.
    /// O(N) over the cache; only used by the track command.
    pub fn subscription_by_hash(&self, chat_id: i64, hash: &MldsaHash) -> Option<Subscription> {
        self.lock()
            .subscriptions
            .values()
            .find(|s| {
                s.chat_id == chat_id
                    && s.linkage
                        .as_ref()
                        .is_some_and(|l| l.mldsa_hash == *hash)
            })
            .cloned()
    }

    /// All distinct primary addresses currently tracked by any chat.
    pub fn tracked_addresses(&self) -> Vec<String> {
        let cache = self.lock();
        let mut addresses: Vec<String> = cache
            .subscriptions
            .values()
            .map(|s| s.address.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        addresses.sort();
        addresses
    }

    /// Primaries with no resolved identity yet, for the per-tick gap fill.
    pub fn unresolved_addresses(&self) -> Vec<String> {
        let cache = self.lock();
        let mut resolved = HashSet::new();
        let mut all = HashSet::new();
        for sub in cache.subscriptions.values() {
            all.insert(sub.address.clone());
            if sub.linkage.is_some() {
                resolved.insert(sub.address.clone());
            }
        }
        let mut out: Vec<String> = all.difference(&resolved).cloned().collect();
        out.sort();
        out
    }

    /// Attach a freshly resolved linkage to every subscription on `address`.
    ///
    /// A subscription whose chat already tracks the same identity under a
    /// different address keeps its linkage empty, preserving the per-chat
    /// identity uniqueness invariant.
    pub fn set_linkage(&self, address: &str, linkage: &Linkage) -> Result<(), Error> {
        let mut cache = self.lock();
        let ids: Vec<String> = cache
            .subscriptions
            .values()
            .filter(|s| s.address == address && s.linkage.is_none())
            .map(|s| s.id.clone())
            .collect();
        for id in ids {
            let chat_id = cache.subscriptions[&id].chat_id;
            let conflict = cache.subscriptions.values().any(|s| {
                s.chat_id == chat_id
                    && s.id != id
                    && s.linkage
                        .as_ref()
                        .is_some_and(|l| l.mldsa_hash == linkage.mldsa_hash)
            });
            if conflict {
                log::warn!(
                    "chat {chat_id} tracks identity {} twice, leaving {address} unlinked",
                    linkage.mldsa_hash
                );
                continue;
            }
            let mut sub = cache.subscriptions[&id].clone();
            sub.linkage = Some(linkage.clone());
            self.put_doc(SUBSCRIPTIONS, &id, &sub)?;
            cache.subscriptions.insert(id, sub);
        }
        Ok(())
    }

    /// Build the three matching projections from the live subscription set.
    pub fn identity_projection(&self) -> IdentityProjection {
        let cache = self.lock();
        let mut projection = IdentityProjection::default();
        for sub in cache.subscriptions.values() {
            projection.tracked.insert(sub.address.clone());
            if let Some(linkage) = &sub.linkage {
                projection
                    .mldsa_by_primary
                    .insert(sub.address.clone(), linkage.mldsa_hash);
                for alias in linkage.addresses() {
                    projection.tracked.insert(alias.to_string());
                    if alias != sub.address {
                        projection
                            .canonical
                            .insert(alias.to_string(), sub.address.clone());
                    }
                }
            }
        }
        projection
    }

    // --- UTXO set ---

    /// Snapshot of the UTXO map, `(txid, vout) → {address, value}`.
    pub fn utxo_map(&self) -> HashMap<OutPoint, TrackedUtxo> {
        self.lock().utxos.clone()
    }

    pub fn is_utxo_seeded(&self, address: &str) -> bool {
        self.lock().utxo_seeded.contains(address)
    }

    /// Store the initial UTXO set for a primary and mark it seeded.
    pub fn seed_utxos(
        &self,
        address: &str,
        utxos: Vec<(OutPoint, TrackedUtxo)>,
    ) -> Result<(), Error> {
        let mut cache = self.lock();
        for (outpoint, utxo) in utxos {
            if utxo.value == 0 {
                return Err(Error::ZeroValueUtxo);
            }
            let doc = UtxoDoc {
                txid: outpoint.txid.clone(),
                vout: outpoint.vout,
                value: utxo.value,
                address: utxo.address.clone(),
            };
            self.put_doc(UTXOS, &outpoint.to_string(), &doc)?;
            cache.utxos.insert(outpoint, utxo);
        }
        let mut seeded = cache.utxo_seeded.clone();
        seeded.insert(address.to_string());
        self.put_address_set("utxo_seeded", &seeded)?;
        cache.utxo_seeded = seeded;
        Ok(())
    }

    /// Apply one block chunk's delta: spends removed first, receives added
    /// second, so a same-chunk spend of a fresh output nets out correctly.
    pub fn apply_utxo_delta(
        &self,
        spent: &[OutPoint],
        received: &[(OutPoint, TrackedUtxo)],
    ) -> Result<(), Error> {
        let mut cache = self.lock();
        for outpoint in spent {
            self.persister.delete(UTXOS, &outpoint.to_string())?;
            cache.utxos.remove(outpoint);
        }
        for (outpoint, utxo) in received {
            if utxo.value == 0 {
                return Err(Error::ZeroValueUtxo);
            }
            let doc = UtxoDoc {
                txid: outpoint.txid.clone(),
                vout: outpoint.vout,
                value: utxo.value,
                address: utxo.address.clone(),
            };
            self.put_doc(UTXOS, &outpoint.to_string(), &doc)?;
            cache.utxos.insert(outpoint.clone(), utxo.clone());
        }
        Ok(())
    }

    // --- Scan cursor ---

    pub fn cursor(&self) -> Height {
        self.lock().cursor
    }

    /// Advance the cursor. Lower or equal heights are ignored, keeping the
    /// cursor monotonic non-decreasing.
    pub fn set_cursor(&self, height: Height) -> Result<(), Error> {
        let mut cache = self.lock();
        if height <= cache.cursor {
            return Ok(());
        }
        self.put_doc(STATE, "cursor", &CursorDoc { value: height })?;
        cache.cursor = height;
        Ok(())
    }

    // --- Access control ---

    pub fn authorize_chat(&self, chat_id: i64, now: Timestamp) -> Result<(), Error> {
        let mut cache = self.lock();
        if cache.authorized.contains_key(&chat_id) {
            return Ok(());
        }
        let chat = AuthorizedChat {
            chat_id,
            authorized_at: now,
        };
        self.put_doc(AUTHORIZED, &chat_id.to_string(), &chat)?;
        cache.authorized.insert(chat_id, chat);
        Ok(())
    }

    pub fn is_authorized(&self, chat_id: i64) -> bool {
        self.lock().authorized.contains_key(&chat_id)
    }

    /// Insert a code minted by the payment pipeline. The funding transaction
    /// may fund at most one code.
    pub fn insert_access_code(&self, code: AccessCode) -> Result<(), Error> {
        AccessCode::validate_syntax(&code.code)?;
        let mut cache = self.lock();
        if cache.codes.contains_key(&code.code) {
            return Err(Error::Generic(format!("access code {} exists", code.code)));
        }
        if let Some(txid) = &code.funding_txid {
            if cache
                .codes
                .values()
                .any(|c| c.funding_txid.as_deref() == Some(txid))
            {
                return Err(Error::Generic(format!(
                    "funding tx {txid} already minted a code"
                )));
            }
        }
        let id = code.code.clone();
        self.put_doc(CODES, &id, &code)?;
        cache.codes.insert(id, code);
        Ok(())
    }

    /// Redeem an access code for `chat_id`.
    ///
    /// A code redeems at most once; redeeming a code the same chat already
    /// used returns the existing paid subscription unchanged. A live paid
    /// subscription is extended, an expired one restarts from `now`.
    pub fn redeem_code(
        &self,
        code_str: &str,
        chat_id: i64,
        now: Timestamp,
    ) -> Result<PaidSubscription, Error> {
        AccessCode::validate_syntax(code_str)?;
        let mut cache = self.lock();

        let code = cache.codes.get(code_str).ok_or(Error::UnknownCode)?.clone();
        if code.redeemed {
            return match (code.redeemed_by, cache.paid.get(&chat_id)) {
                (Some(by), Some(paid)) if by == chat_id => Ok(paid.clone()),
                _ => Err(Error::CodeAlreadyRedeemed),
            };
        }
        if now >= code.expires_at {
            return Err(Error::CodeExpired);
        }

        let base = match cache.paid.get(&chat_id) {
            Some(paid) if paid.expires_at > now => paid.expires_at,
            _ => now,
        };
        let paid = PaidSubscription {
            chat_id,
            expires_at: base + u64::from(code.duration_days) * 86_400,
            code: code.code.clone(),
            paid_by: code.funding_txid.clone(),
        };
        let redeemed = AccessCode {
            redeemed: true,
            redeemed_by: Some(chat_id),
            ..code
        };

        self.put_doc(CODES, code_str, &redeemed)?;
        self.put_doc(PAID, &chat_id.to_string(), &paid)?;
        cache.codes.insert(code_str.to_string(), redeemed);
        cache.paid.insert(chat_id, paid.clone());
        drop(cache);

        self.authorize_chat(chat_id, now)?;
        Ok(paid)
    }

    pub fn paid_subscription(&self, chat_id: i64) -> Option<PaidSubscription> {
        self.lock().paid.get(&chat_id).cloned()
    }

    /// Whether `chat_id` may receive notifications right now.
    pub fn has_active_subscription(&self, chat_id: i64, now: Timestamp) -> bool {
        self.lock()
            .paid
            .get(&chat_id)
            .is_some_and(|p| now < p.expires_at)
    }

    // --- Token watches ---

    pub fn add_token_watch(
        &self,
        chat_id: i64,
        contract: &str,
        label: &str,
        kind: TokenKind,
        price_alert_percent: f64,
        min_reservation_sats: u64,
    ) -> Result<TokenWatch, Error> {
        let mut cache = self.lock();
        if cache
            .token_watches
            .values()
            .any(|w| w.chat_id == chat_id && w.contract == contract)
        {
            return Err(Error::AlreadyWatching {
                contract: contract.to_string(),
            });
        }

        let mut rng = rand::thread_rng();
        let mut id = new_short_id(&mut rng);
        while cache.token_watches.contains_key(&id) {
            id = new_short_id(&mut rng);
        }

        let watch = TokenWatch {
            id: id.clone(),
            chat_id,
            contract: contract.to_string(),
            label: label.to_string(),
            kind,
            price_alert_percent,
            min_reservation_sats,
        };
        self.put_doc(TOKEN_WATCHES, &id, &watch)?;
        cache.token_watches.insert(id, watch.clone());
        Ok(watch)
    }

    pub fn remove_token_watch(&self, chat_id: i64, watch_id: &str) -> Result<TokenWatch, Error> {
        let mut cache = self.lock();
        let watch = match cache.token_watches.get(watch_id) {
            Some(watch) if watch.chat_id == chat_id => watch.clone(),
            _ => return Err(Error::TokenWatchNotFound(watch_id.to_string())),
        };
        self.persister.delete(TOKEN_WATCHES, watch_id)?;
        cache.token_watches.remove(watch_id);
        Ok(watch)
    }

    pub fn token_watches(&self, chat_id: i64) -> Vec<TokenWatch> {
        let mut watches: Vec<TokenWatch> = self
            .lock()
            .token_watches
            .values()
            .filter(|w| w.chat_id == chat_id)
            .cloned()
            .collect();
        watches.sort_by(|a, b| a.id.cmp(&b.id));
        watches
    }

    pub fn all_token_watches(&self) -> Vec<TokenWatch> {
        self.lock().token_watches.values().cloned().collect()
    }

    // --- Seen contracts ---

    /// Record that `contract` was observed interacting with `address`.
    /// Returns whether the contract was newly seen for the address.
    pub fn record_seen_contract(
        &self,
        address: &str,
        contract: &str,
        nft: bool,
    ) -> Result<bool, Error> {
        let mut cache = self.lock();
        let mut seen = cache.seen.get(address).cloned().unwrap_or_else(|| SeenContracts {
            address: address.to_string(),
            ..Default::default()
        });
        let newly = seen.contracts.insert(contract.to_string());
        let nft_changed = nft && seen.nft_contracts.insert(contract.to_string());
        if newly || nft_changed {
            self.put_doc(SEEN, address, &seen)?;
            cache.seen.insert(address.to_string(), seen);
        }
        Ok(newly)
    }

    pub fn seen_contracts(&self, address: &str) -> Vec<String> {
        self.lock()
            .seen
            .get(address)
            .map(|s| s.contracts.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Contracts to treat as NFT collections when classifying transfers:
    /// everything observed behaving as one, plus explicit NFT token watches.
    pub fn nft_contracts(&self) -> HashSet<String> {
        let cache = self.lock();
        let mut out: HashSet<String> = cache
            .seen
            .values()
            .flat_map(|s| s.nft_contracts.iter().cloned())
            .collect();
        out.extend(
            cache
                .token_watches
                .values()
                .filter(|w| w.kind == TokenKind::Nft)
                .map(|w| w.contract.clone()),
        );
        out
    }

    pub fn is_history_scanned(&self, address: &str) -> bool {
        self.lock().history_scanned.contains(address)
    }

    pub fn mark_history_scanned(&self, address: &str) -> Result<(), Error> {
        let mut cache = self.lock();
        if !cache.history_scanned.contains(address) {
            let mut scanned = cache.history_scanned.clone();
            scanned.insert(address.to_string());
            self.put_address_set("history_scanned", &scanned)?;
            cache.history_scanned = scanned;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenKind;
    use wsk_common::MemoryStore;

    const HASH_A: &str = "aa04bdd30e0f7bb4dfa1c27d1a9d3d79c78ffd9ab7c78c978d0bd2742e837e01";
    const HASH_B: &str = "bb04bdd30e0f7bb4dfa1c27d1a9d3d79c78ffd9ab7c78c978d0bd2742e837e02";

    fn store() -> Store {
        Store::open(Arc::new(MemoryStore::new())).unwrap()
    }

    fn linkage(hash: &str, primary: &str) -> Linkage {
        let mut l = Linkage::new(hash.parse().unwrap());
        l.p2tr = Some(format!("{primary}-p2tr"));
        l.csv1 = Some(format!("{primary}-csv1"));
        l
    }

    fn utxo(txid: &str, vout: u32, address: &str, value: u64) -> (OutPoint, TrackedUtxo) {
        (
            OutPoint::new(txid, vout),
            TrackedUtxo {
                address: address.to_string(),
                value,
            },
        )
    }

    #[test]
    fn test_track_rejects_duplicate_address() {
        let store = store();
        store.track(1, "bc1qa", "main", None, 20, 0).unwrap();
        let err = store.track(1, "bc1qa", "again", None, 20, 1).unwrap_err();
        assert!(matches!(err, Error::AlreadyTracking { address } if address == "bc1qa"));

        // another chat can track the same address
        store.track(2, "bc1qa", "other", None, 20, 2).unwrap();
    }

    #[test]
    fn test_track_rejects_same_identity_under_other_format() {
        let store = store();
        store
            .track(1, "bc1qa", "main", Some(linkage(HASH_A, "bc1qa")), 20, 0)
            .unwrap();

        // tracking the hash form of the same identity is refused, naming the
        // address already on file
        let err = store
            .track(1, &format!("0x{HASH_A}"), "dup", Some(linkage(HASH_A, "x")), 20, 1)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyTracking { address } if address == "bc1qa"));

        // a different identity is fine
        store
            .track(1, "bc1qb", "second", Some(linkage(HASH_B, "bc1qb")), 20, 2)
            .unwrap();
    }

    #[test]
    fn test_track_wallet_limit() {
        let store = store();
        store.track(1, "bc1qa", "a", None, 2, 0).unwrap();
        store.track(1, "bc1qb", "b", None, 2, 1).unwrap();
        let err = store.track(1, "bc1qc", "c", None, 2, 2).unwrap_err();
        assert!(matches!(err, Error::WalletLimitReached(2)));
    }

    #[test]
    fn test_untrack_garbage_collects_per_address_state() {
        let store = store();
        let sub1 = store.track(1, "bc1qa", "a", None, 20, 0).unwrap();
        let sub2 = store.track(2, "bc1qa", "a", None, 20, 0).unwrap();
        store
            .seed_utxos("bc1qa", vec![utxo("t0", 0, "bc1qa", 500_000)])
            .unwrap();
        assert!(store.is_utxo_seeded("bc1qa"));

        store.untrack(1, &sub1.id).unwrap();
        assert_eq!(store.utxo_map().len(), 1, "other chat still tracks");

        store.untrack(2, &sub2.id).unwrap();
        assert_eq!(store.utxo_map().len(), 0);
        assert!(!store.is_utxo_seeded("bc1qa"));

        let err = store.untrack(2, &sub2.id).unwrap_err();
        assert!(matches!(err, Error::SubscriptionNotFound(_)));
    }

    #[test]
    fn test_utxo_delta() {
        let store = store();
        store.track(1, "bc1qa", "a", None, 20, 0).unwrap();
        store
            .seed_utxos("bc1qa", vec![utxo("t0", 0, "bc1qa", 500_000)])
            .unwrap();

        store
            .apply_utxo_delta(
                &[OutPoint::new("t0", 0)],
                &[utxo("t1", 1, "bc1qa", 199_500)],
            )
            .unwrap();

        let map = store.utxo_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&OutPoint::new("t1", 1)].value, 199_500);

        let err = store
            .apply_utxo_delta(&[], &[utxo("t2", 0, "bc1qa", 0)])
            .unwrap_err();
        assert!(matches!(err, Error::ZeroValueUtxo));
    }

    #[test]
    fn test_cursor_monotonic() {
        let store = store();
        assert_eq!(store.cursor(), 0);
        store.set_cursor(100).unwrap();
        store.set_cursor(90).unwrap();
        store.set_cursor(100).unwrap();
        assert_eq!(store.cursor(), 100);
        store.set_cursor(101).unwrap();
        assert_eq!(store.cursor(), 101);
    }

    #[test]
    fn test_redeem_code() {
        let store = store();
        store
            .insert_access_code(AccessCode {
                code: "JT-ABC123DEF456".to_string(),
                redeemed: false,
                redeemed_by: None,
                expires_at: 1_000,
                duration_days: 30,
                funding_txid: Some("f0".to_string()),
            })
            .unwrap();

        assert!(matches!(
            store.redeem_code("garbage", 7, 500),
            Err(Error::MalformedCode)
        ));
        assert!(matches!(
            store.redeem_code("JT-000000000000", 7, 500),
            Err(Error::UnknownCode)
        ));

        let paid = store.redeem_code("JT-ABC123DEF456", 7, 500).unwrap();
        assert_eq!(paid.expires_at, 500 + 30 * 86_400);
        assert!(store.is_authorized(7));
        assert!(store.has_active_subscription(7, 501));
        assert!(!store.has_active_subscription(7, paid.expires_at));

        // idempotent for the redeeming chat, refused for anyone else
        let again = store.redeem_code("JT-ABC123DEF456", 7, 600).unwrap();
        assert_eq!(again, paid);
        assert!(matches!(
            store.redeem_code("JT-ABC123DEF456", 8, 600),
            Err(Error::CodeAlreadyRedeemed)
        ));
    }

    #[test]
    fn test_redeem_extends_live_subscription() {
        let store = store();
        for (code, txid) in [("JT-AAA111BBB222", "f1"), ("JT-CCC333DDD444", "f2")] {
            store
                .insert_access_code(AccessCode {
                    code: code.to_string(),
                    redeemed: false,
                    redeemed_by: None,
                    expires_at: 1_000_000,
                    duration_days: 10,
                    funding_txid: Some(txid.to_string()),
                })
                .unwrap();
        }
        let first = store.redeem_code("JT-AAA111BBB222", 7, 100).unwrap();
        let second = store.redeem_code("JT-CCC333DDD444", 7, 200).unwrap();
        assert_eq!(second.expires_at, first.expires_at + 10 * 86_400);
    }

    #[test]
    fn test_expired_code_refused() {
        let store = store();
        store
            .insert_access_code(AccessCode {
                code: "JT-EEE555FFF666".to_string(),
                redeemed: false,
                redeemed_by: None,
                expires_at: 100,
                duration_days: 30,
                funding_txid: None,
            })
            .unwrap();
        assert!(matches!(
            store.redeem_code("JT-EEE555FFF666", 7, 100),
            Err(Error::CodeExpired)
        ));
    }

    #[test]
    fn test_duplicate_funding_tx_refused() {
        let store = store();
        let code = AccessCode {
            code: "JT-AAA111BBB222".to_string(),
            redeemed: false,
            redeemed_by: None,
            expires_at: 1_000,
            duration_days: 30,
            funding_txid: Some("f0".to_string()),
        };
        store.insert_access_code(code.clone()).unwrap();
        let dup = AccessCode {
            code: "JT-CCC333DDD444".to_string(),
            ..code
        };
        assert!(store.insert_access_code(dup).is_err());
    }

    #[test]
    fn test_token_watch_unique_per_contract() {
        let store = store();
        store
            .add_token_watch(1, "op1contract", "MOTO", TokenKind::Fungible, 5.0, 0)
            .unwrap();
        let err = store
            .add_token_watch(1, "op1contract", "again", TokenKind::Fungible, 1.0, 0)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyWatching { .. }));

        let watch = store
            .add_token_watch(2, "op1contract", "MOTO", TokenKind::Nft, 0.0, 10_000)
            .unwrap();
        assert_eq!(store.token_watches(2).len(), 1);
        store.remove_token_watch(2, &watch.id).unwrap();
        assert!(store.token_watches(2).is_empty());
    }

    #[test]
    fn test_seen_contracts_and_nft_set() {
        let store = store();
        assert!(store.record_seen_contract("bc1qa", "op1token", false).unwrap());
        assert!(!store.record_seen_contract("bc1qa", "op1token", false).unwrap());
        assert!(store.record_seen_contract("bc1qa", "op1punks", true).unwrap());
        assert_eq!(store.seen_contracts("bc1qa").len(), 2);

        store
            .add_token_watch(1, "op1apes", "APES", TokenKind::Nft, 0.0, 0)
            .unwrap();
        let nft = store.nft_contracts();
        assert!(nft.contains("op1punks"));
        assert!(nft.contains("op1apes"));
        assert!(!nft.contains("op1token"));
    }

    #[test]
    fn test_identity_projection() {
        let store = store();
        store
            .track(1, "bc1qa", "a", Some(linkage(HASH_A, "bc1qa")), 20, 0)
            .unwrap();
        store.track(1, "bc1qb", "b", None, 20, 1).unwrap();

        let projection = store.identity_projection();
        assert!(projection.is_tracked("bc1qa"));
        assert!(projection.is_tracked("bc1qa-p2tr"));
        assert!(projection.is_tracked("bc1qa-csv1"));
        assert!(projection.is_tracked("bc1qb"));
        assert_eq!(projection.canonicalize("bc1qa-p2tr"), "bc1qa");
        assert_eq!(projection.canonicalize("bc1qb"), "bc1qb");
        // keyed by primary only
        assert_eq!(projection.mldsa_by_primary.len(), 1);
        assert_eq!(
            projection.mldsa_by_primary["bc1qa"].to_string(),
            HASH_A
        );
    }

    #[test]
    fn test_set_linkage_fills_gaps_and_respects_identity_invariant() {
        let store = store();
        store
            .track(1, "bc1qa", "a", Some(linkage(HASH_A, "bc1qa")), 20, 0)
            .unwrap();
        // same identity tracked under another (unresolved) format slipped in
        store.track(1, "bc1qa-alias", "alias", None, 20, 1).unwrap();
        store.track(2, "bc1qa-alias", "alias", None, 20, 1).unwrap();

        assert_eq!(store.unresolved_addresses(), vec!["bc1qa-alias"]);
        store
            .set_linkage("bc1qa-alias", &linkage(HASH_A, "bc1qa-alias"))
            .unwrap();

        // chat 1 already tracks HASH_A: its alias subscription stays unlinked
        let chat1 = store.subscriptions(1);
        let alias_sub = chat1.iter().find(|s| s.address == "bc1qa-alias").unwrap();
        assert!(alias_sub.linkage.is_none());

        // chat 2 had no conflict and got the linkage
        let chat2 = store.subscriptions(2);
        assert!(chat2[0].linkage.is_some());
    }

    #[test]
    fn test_subscription_by_hash() {
        let store = store();
        store
            .track(1, "bc1qa", "a", Some(linkage(HASH_A, "bc1qa")), 20, 0)
            .unwrap();
        let hash: MldsaHash = HASH_A.parse().unwrap();
        assert!(store.subscription_by_hash(1, &hash).is_some());
        assert!(store.subscription_by_hash(2, &hash).is_none());
    }
}
