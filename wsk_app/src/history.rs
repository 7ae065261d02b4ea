//! Background backfill of the seen-contract set for a freshly tracked
//! wallet, so balance queries and NFT formatting know the identity's
//! history without waiting for new activity.

use std::sync::Arc;
use wsk_common::MldsaHash;
use wsk_indexer::IndexerClient;
use wsk_store::Store;

const PAGE: u32 = 100;
const MAX_PAGES: u32 = 10;

/// Fire-and-forget: pull prior transfers for the identity and record every
/// contract seen. Failures only log; the next track of the same identity
/// retries.
pub fn spawn_history_scan(
    store: Arc<Store>,
    indexer: Arc<IndexerClient>,
    primary: String,
    hash: MldsaHash,
) {
    tokio::spawn(async move {
        if store.is_history_scanned(&primary) {
            return;
        }
        if let Err(e) = scan(&store, &indexer, &primary, &hash).await {
            log::warn!("history scan for {primary} failed: {e}");
        }
    });
}

async fn scan(
    store: &Store,
    indexer: &IndexerClient,
    primary: &str,
    hash: &MldsaHash,
) -> Result<(), crate::Error> {
    let hash = hash.to_string();
    let mut skip = 0;
    for _ in 0..MAX_PAGES {
        let transfers = indexer.transfers(&hash, PAGE, skip).await?;
        let done = (transfers.len() as u32) < PAGE;
        for transfer in &transfers {
            store.record_seen_contract(primary, &transfer.contract, transfer.is_nft)?;
        }
        if done {
            break;
        }
        skip += PAGE;
    }
    store.mark_history_scanned(primary)?;
    log::debug!("history scan complete for {primary}");
    Ok(())
}
