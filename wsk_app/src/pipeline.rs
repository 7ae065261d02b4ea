//! The per-tick driver: advance the cursor, reconcile the indexer and the
//! chain RPC, deduplicate and suppress overlapping events, and hand the
//! survivors to the notifier.
//!
//! The pure stages (promotion, dedup, suppression, filtering) are split out
//! of the I/O so the reconciliation rules are testable with literal values.

use crate::consts::{BLOCK_BATCH, SESSION_LRU_CAP};
use crate::events::Notifier;
use crate::Error;
use futures::future::try_join_all;
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use wsk_chain::{scan_block, RpcClient};
use wsk_common::{
    Direction, EventKind, Height, IdentityProjection, InferredSend, Network, OutPoint,
    Timestamp, TrackedUtxo, WalletEvent,
};
use wsk_indexer::{match_batch, IndexerClient, WatchSpec};
use wsk_store::Store;

/// Promote inferred sends whose transaction produced no confirmed spend.
///
/// The UTXO path is strictly better evidence; an inferred send only stands
/// in when the spent output was unknown (typically created before tracking
/// began). False positives left over are removed by suppression.
pub fn promote_inferred(
    inferred: Vec<InferredSend>,
    events: &[WalletEvent],
) -> Vec<WalletEvent> {
    let confirmed: HashSet<&str> = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::BtcSent { .. }))
        .map(|e| e.tx_hash.as_str())
        .collect();

    inferred
        .into_iter()
        .filter(|i| !confirmed.contains(i.tx_hash.as_str()))
        .map(|i| WalletEvent {
            address: i.address,
            tx_hash: i.tx_hash,
            block_height: i.block_height,
            contract: None,
            kind: EventKind::BtcSent {
                satoshis: i.total_sent,
                counterparty: Some(i.counterparty),
                recipient_amount: Some(i.total_sent),
            },
        })
        .collect()
}

/// Drop events reporting the same fact twice across the two sources.
pub fn dedup_events(events: Vec<WalletEvent>) -> Vec<WalletEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert(e.dedup_key()))
        .collect()
}

/// The `(address, block)` pairs whose raw BTC movement is plumbing:
/// contract semantics already account for it.
pub fn suppression_set(events: &[WalletEvent]) -> HashSet<(String, Height)> {
    let mut set = HashSet::new();
    let mut token_in = HashSet::new();
    let mut token_out = HashSet::new();

    for event in events {
        let key = (event.address.clone(), event.block_height);
        match &event.kind {
            // the swap's btcSpent already represents net cost
            EventKind::SwapExecuted { .. }
            // BTC in these txs is gas plumbing
            | EventKind::LiquidityReserved { .. }
            | EventKind::LiquidityAdded { .. }
            | EventKind::LiquidityRemoved { .. }
            | EventKind::Staked { .. }
            | EventKind::Unstaked { .. }
            | EventKind::RewardsClaimed { .. } => {
                set.insert(key);
            }
            EventKind::Token { direction, .. } | EventKind::NftTransfer { direction, .. } => {
                match direction {
                    Direction::In => token_in.insert(key),
                    Direction::Out => token_out.insert(key),
                };
            }
            EventKind::BtcSent { .. }
            | EventKind::BtcReceived { .. }
            | EventKind::ProviderConsumed { .. } => {}
        }
    }

    // a token leg in and out at the same (address, block) is an OP20↔OP20
    // trade; its BTC is gas
    set.extend(token_in.intersection(&token_out).cloned());
    set
}

/// Remove BTC events whose `(address, block)` the suppression set covers.
pub fn filter_suppressed(
    events: Vec<WalletEvent>,
    set: &HashSet<(String, Height)>,
) -> Vec<WalletEvent> {
    events
        .into_iter()
        .filter(|e| !e.kind.is_btc() || !set.contains(&(e.address.clone(), e.block_height)))
        .collect()
}

pub(crate) fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The tick loop state: shared collaborators plus the session-scoped
/// notified-transaction cache.
pub struct Poller {
    store: Arc<Store>,
    rpc: Arc<RpcClient>,
    indexer: Arc<IndexerClient>,
    notifier: Notifier,
    network: Network,

    /// Transactions already notified this session. Deliberately not
    /// persisted: across restarts the cursor bounds re-delivery.
    notified_txs: LruCache<String, ()>,
}

impl Poller {
    pub fn new(
        store: Arc<Store>,
        rpc: Arc<RpcClient>,
        indexer: Arc<IndexerClient>,
        notifier: Notifier,
        network: Network,
    ) -> Self {
        Poller {
            store,
            rpc,
            indexer,
            notifier,
            network,
            notified_txs: LruCache::new(
                NonZeroUsize::new(SESSION_LRU_CAP).expect("cap is non-zero"),
            ),
        }
    }

    /// Run one tick. On any error the cursor stays put and the next tick
    /// replays the same range; every store write along the way is an upsert
    /// keyed by natural keys, so the replay is idempotent.
    pub async fn tick(&mut self) -> Result<(), Error> {
        let cursor = self.store.cursor();
        let batch = self.indexer.events_since(cursor + 1).await?;
        let target = batch.last_indexed_block;
        if cursor >= target {
            return Ok(());
        }
        log::debug!("tick: scanning blocks {}..={target}", cursor + 1);

        self.resolve_gaps().await;
        let projection = self.store.identity_projection();
        self.seed_new_wallets().await?;

        // indexer side
        let watches: Vec<WatchSpec> = self
            .store
            .all_token_watches()
            .into_iter()
            .map(|w| WatchSpec {
                chat_id: w.chat_id,
                contract: w.contract,
                label: w.label,
                price_alert_percent: w.price_alert_percent,
                min_reservation_sats: w.min_reservation_sats,
            })
            .collect();
        let outcome = match_batch(&batch, &projection, &self.store.nft_contracts(), &watches);
        for (primary, contract, nft) in &outcome.seen_contracts {
            self.store.record_seen_contract(primary, contract, *nft)?;
        }

        // chain side
        let Some((btc_events, inferred)) =
            self.scan_blocks(cursor + 1, target, &projection).await?
        else {
            // a block inside the range is not on the node yet; retry intact
            return Ok(());
        };

        // reconciliation
        let mut events = outcome.events;
        events.extend(btc_events);
        let promoted = promote_inferred(inferred, &events);
        events.extend(promoted);
        let events = dedup_events(events);
        let suppression = suppression_set(&events);
        let mut events = filter_suppressed(events, &suppression);
        events.sort_by_key(|e| e.block_height);
        events.retain(|e| !self.notified_txs.contains(&e.tx_hash));

        let now = unix_now();
        self.notifier.dispatch_events(&events, now).await?;
        self.notifier
            .dispatch_price_alerts(&outcome.price_alerts, now)
            .await?;
        self.notifier
            .dispatch_reservation_alerts(&outcome.reservation_alerts, now)
            .await?;

        for event in &events {
            self.notified_txs.put(event.tx_hash.clone(), ());
        }

        self.store.set_cursor(target)?;
        Ok(())
    }

    /// Fill identity linkages the resolver has not produced yet. Failures
    /// are absorbed; the address retries next tick.
    async fn resolve_gaps(&self) {
        for address in self.store.unresolved_addresses() {
            match wsk_chain::resolve(&self.rpc, self.network, &address).await {
                Ok(Some(linkage)) => {
                    if let Err(e) = self.store.set_linkage(&address, &linkage) {
                        log::warn!("storing linkage for {address} failed: {e}");
                        continue;
                    }
                    // track-time resolution failed for this wallet, so the
                    // history backfill still owes it a run
                    crate::history::spawn_history_scan(
                        self.store.clone(),
                        self.indexer.clone(),
                        address.clone(),
                        linkage.mldsa_hash,
                    );
                }
                Ok(None) => log::debug!("no owner record for {address} yet"),
                Err(e) => log::warn!("resolving {address} failed: {e}"),
            }
        }
    }

    /// Seed the UTXO set of primaries seen for the first time.
    async fn seed_new_wallets(&self) -> Result<(), Error> {
        for primary in self.store.tracked_addresses() {
            if self.store.is_utxo_seeded(&primary) {
                continue;
            }
            let linkage = self
                .store
                .subscriptions_for_address(&primary)
                .into_iter()
                .find_map(|s| s.linkage);
            let utxos = wsk_chain::seed_utxos(&self.rpc, &primary, linkage.as_ref()).await?;
            self.store.seed_utxos(&primary, utxos)?;
        }
        Ok(())
    }

    /// Fetch and scan `from..=to` in chunks, applying each chunk's UTXO
    /// delta before the next so cross-chunk spends resolve. Returns `None`
    /// when the node is missing a block in the range.
    async fn scan_blocks(
        &self,
        from: Height,
        to: Height,
        projection: &IdentityProjection,
    ) -> Result<Option<(Vec<WalletEvent>, Vec<InferredSend>)>, Error> {
        let mut utxo_map: HashMap<OutPoint, TrackedUtxo> = self.store.utxo_map();
        let mut events = vec![];
        let mut inferred = vec![];

        let heights: Vec<Height> = (from..=to).collect();
        for chunk in heights.chunks(BLOCK_BATCH) {
            let blocks = try_join_all(
                chunk
                    .iter()
                    .map(|height| self.rpc.block_by_number(*height, true)),
            )
            .await?;

            for block in blocks {
                let Some(block) = block else {
                    log::debug!("block missing on node, deferring tick");
                    return Ok(None);
                };
                let scan = scan_block(&block, projection, &utxo_map);

                self.store.apply_utxo_delta(&scan.spent, &scan.received)?;
                for outpoint in &scan.spent {
                    utxo_map.remove(outpoint);
                }
                for (outpoint, utxo) in &scan.received {
                    utxo_map.insert(outpoint.clone(), utxo.clone());
                }

                events.extend(scan.events);
                inferred.extend(scan.inferred);
            }
        }

        Ok(Some((events, inferred)))
    }
}
