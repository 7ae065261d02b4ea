//! UTXO-set seeding for newly tracked wallets.
//!
//! Addresses usually received coins before anyone tracked them, so the first
//! time a primary is seen its current unspent set is pulled from the node
//! across every linked form. From then on the set is maintained from block
//! deltas alone.

use crate::rpc::RpcClient;
use crate::Error;
use futures::stream::{iter, StreamExt};
use std::collections::HashMap;
use wsk_common::{Linkage, OutPoint, TrackedUtxo};

/// Fetch the union of unspent outputs across the primary and all of its
/// linked forms, attributed to the primary's canonical address.
///
/// The CSV-timelock form goes through the dedicated RPC path; everything else
/// through the standard one. Pending outputs are merged in so a wallet funded
/// moments ago still seeds correctly.
pub async fn seed_utxos(
    rpc: &RpcClient,
    primary: &str,
    linkage: Option<&Linkage>,
) -> Result<Vec<(OutPoint, TrackedUtxo)>, Error> {
    let mut queries: Vec<(String, bool)> = vec![(primary.to_string(), false)];
    if let Some(linkage) = linkage {
        for alias in linkage.addresses() {
            if alias == primary {
                continue;
            }
            let is_csv = linkage.csv1.as_deref() == Some(alias);
            queries.push((alias.to_string(), is_csv));
        }
    }

    let results: Vec<Result<Vec<_>, Error>> = iter(queries)
        .map(|(address, is_csv)| async move { rpc.utxos(&address, is_csv, true).await })
        .buffer_unordered(rpc.concurrency())
        .collect()
        .await;

    let mut union: HashMap<OutPoint, TrackedUtxo> = HashMap::new();
    for result in results {
        for utxo in result? {
            if utxo.value == 0 {
                continue;
            }
            union.insert(
                OutPoint::new(utxo.transaction_id, utxo.output_index),
                TrackedUtxo {
                    address: primary.to_string(),
                    value: utxo.value,
                },
            );
        }
    }

    log::debug!("seeded {} utxos for {primary}", union.len());
    Ok(union.into_iter().collect())
}
