//! Projection of indexer record batches against the tracked identity set.
//!
//! Actor fields carrying an identity hash are matched through the
//! primary→hash map so events attribute to the subscription address; fields
//! carrying a BTC address are matched through the tracked set with canonical
//! normalisation. One malformed record is skipped with a warning, the rest
//! of the batch survives.

use crate::model::{
    EventsBatch, PoolEventKind, PoolEventRecord, PriceChangeRecord, ReservationRecord,
    StakingEventKind, StakingEventRecord, SwapRecord, TransferRecord,
};
use std::collections::HashSet;
use wsk_common::amount::{parse_sats, parse_units};
use wsk_common::{
    Direction, EventKind, IdentityProjection, ReservationRole, WalletEvent,
};

/// A token watch as the matcher needs it; the store's view is flattened to
/// avoid coupling this crate to the store layer.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    pub chat_id: i64,
    pub contract: String,
    pub label: String,

    /// Percent move worth alerting on, 0 disables.
    pub price_alert_percent: f64,

    /// Minimum reservation size worth alerting on in satoshis, 0 disables.
    pub min_reservation_sats: u64,
}

/// A price move that crossed a token watch threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub chat_id: i64,
    pub contract: String,
    pub label: String,
    pub change_percent: f64,
    pub new_price: String,
}

/// A reservation at least as large as a token watch's threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationAlert {
    pub chat_id: i64,
    pub contract: String,
    pub label: String,
    pub satoshis: u64,
    pub token_amount: u128,
}

/// Everything a batch projected to: wallet events for subscribers, alerts
/// for token watches, and the contracts newly observed per primary.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub events: Vec<WalletEvent>,

    pub price_alerts: Vec<PriceAlert>,

    pub reservation_alerts: Vec<ReservationAlert>,

    /// `(primary, contract, behaves_as_nft)` observations to persist.
    pub seen_contracts: Vec<(String, String, bool)>,
}

/// Project one indexer batch.
pub fn match_batch(
    batch: &EventsBatch,
    projection: &IdentityProjection,
    nft_contracts: &HashSet<String>,
    watches: &[WatchSpec],
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for record in &batch.transfers {
        match_transfer(record, projection, nft_contracts, &mut outcome);
    }
    for record in &batch.reservations {
        match_reservation(record, projection, watches, &mut outcome);
    }
    for record in &batch.swaps {
        match_swap(record, projection, &mut outcome);
    }
    for record in &batch.pool_events {
        match_pool_event(record, projection, &mut outcome);
    }
    for record in &batch.staking_events {
        match_staking_event(record, projection, &mut outcome);
    }
    for record in &batch.price_changes {
        match_price_change(record, watches, &mut outcome);
    }

    outcome
}

fn match_transfer(
    record: &TransferRecord,
    projection: &IdentityProjection,
    nft_contracts: &HashSet<String>,
    outcome: &mut MatchOutcome,
) {
    let amount = match parse_units(&record.value) {
        Ok(amount) => amount,
        Err(e) => {
            log::warn!("skipping transfer {}: {e}", record.tx_hash);
            return;
        }
    };
    let nft = record.is_nft || nft_contracts.contains(&record.contract);

    for (primary, hash) in &projection.mldsa_by_primary {
        for (actor, direction) in [(&record.from, Direction::Out), (&record.to, Direction::In)] {
            if !hash.matches_actor(actor) {
                continue;
            }
            let kind = if nft {
                EventKind::NftTransfer { direction, amount }
            } else {
                EventKind::Token { direction, amount }
            };
            outcome.events.push(WalletEvent {
                address: primary.clone(),
                tx_hash: record.tx_hash.clone(),
                block_height: record.block_height,
                contract: Some(record.contract.clone()),
                kind,
            });
            outcome
                .seen_contracts
                .push((primary.clone(), record.contract.clone(), record.is_nft));
        }
    }
}

fn match_reservation(
    record: &ReservationRecord,
    projection: &IdentityProjection,
    watches: &[WatchSpec],
    outcome: &mut MatchOutcome,
) {
    let (Ok(satoshis), Ok(token_amount)) =
        (parse_sats(&record.satoshis), parse_units(&record.token_amount))
    else {
        log::warn!("skipping reservation {}: bad amounts", record.tx_hash);
        return;
    };

    let mut push = |address: String, role: ReservationRole| {
        outcome.events.push(WalletEvent {
            address,
            tx_hash: record.tx_hash.clone(),
            block_height: record.block_height,
            contract: Some(record.contract.clone()),
            kind: EventKind::LiquidityReserved {
                role,
                satoshis,
                token_amount,
            },
        });
    };

    for (primary, hash) in &projection.mldsa_by_primary {
        if hash.matches_actor(&record.provider) {
            push(primary.clone(), ReservationRole::Seller);
        }
        if hash.matches_actor(&record.buyer) {
            push(primary.clone(), ReservationRole::Buyer);
        }
    }
    // the buyer side sometimes carries a plain BTC address
    if projection.is_tracked(&record.buyer) {
        push(
            projection.canonicalize(&record.buyer).to_string(),
            ReservationRole::Buyer,
        );
    }

    for watch in watches {
        if watch.min_reservation_sats > 0
            && watch.contract == record.contract
            && satoshis >= watch.min_reservation_sats
        {
            outcome.reservation_alerts.push(ReservationAlert {
                chat_id: watch.chat_id,
                contract: watch.contract.clone(),
                label: watch.label.clone(),
                satoshis,
                token_amount,
            });
        }
    }
}

fn match_swap(record: &SwapRecord, projection: &IdentityProjection, outcome: &mut MatchOutcome) {
    let (Ok(btc_spent), Ok(tokens_received)) = (
        parse_sats(&record.btc_spent),
        parse_units(&record.tokens_received),
    ) else {
        log::warn!("skipping swap {}: bad amounts", record.tx_hash);
        return;
    };

    for (primary, hash) in &projection.mldsa_by_primary {
        if hash.matches_actor(&record.buyer) {
            outcome.events.push(WalletEvent {
                address: primary.clone(),
                tx_hash: record.tx_hash.clone(),
                block_height: record.block_height,
                contract: Some(record.contract.clone()),
                kind: EventKind::SwapExecuted {
                    btc_spent,
                    tokens_received,
                },
            });
        }

        for fill in &record.providers {
            if !hash.matches_actor(&fill.provider) {
                continue;
            }
            let (Ok(satoshis), Ok(token_amount)) =
                (parse_sats(&fill.satoshis), parse_units(&fill.token_amount))
            else {
                log::warn!("skipping provider fill in swap {}", record.tx_hash);
                continue;
            };
            outcome.events.push(WalletEvent {
                address: primary.clone(),
                tx_hash: record.tx_hash.clone(),
                block_height: record.block_height,
                contract: Some(record.contract.clone()),
                kind: EventKind::ProviderConsumed {
                    satoshis,
                    token_amount,
                },
            });
        }
    }
}

fn match_pool_event(
    record: &PoolEventRecord,
    projection: &IdentityProjection,
    outcome: &mut MatchOutcome,
) {
    let (Ok(satoshis), Ok(token_amount)) =
        (parse_sats(&record.satoshis), parse_units(&record.token_amount))
    else {
        log::warn!("skipping pool event {}: bad amounts", record.tx_hash);
        return;
    };

    for (primary, hash) in &projection.mldsa_by_primary {
        if !hash.matches_actor(&record.provider) {
            continue;
        }
        let kind = match record.kind {
            PoolEventKind::Add => EventKind::LiquidityAdded {
                satoshis,
                token_amount,
            },
            PoolEventKind::Remove => EventKind::LiquidityRemoved {
                satoshis,
                token_amount,
            },
        };
        outcome.events.push(WalletEvent {
            address: primary.clone(),
            tx_hash: record.tx_hash.clone(),
            block_height: record.block_height,
            contract: Some(record.contract.clone()),
            kind,
        });
    }
}

fn match_staking_event(
    record: &StakingEventRecord,
    projection: &IdentityProjection,
    outcome: &mut MatchOutcome,
) {
    let amount = match parse_units(&record.amount) {
        Ok(amount) => amount,
        Err(e) => {
            log::warn!("skipping staking event {}: {e}", record.tx_hash);
            return;
        }
    };

    for (primary, hash) in &projection.mldsa_by_primary {
        if !hash.matches_actor(&record.staker) {
            continue;
        }
        let kind = match record.kind {
            StakingEventKind::Stake => EventKind::Staked { amount },
            StakingEventKind::Unstake => EventKind::Unstaked { amount },
            StakingEventKind::Claim => EventKind::RewardsClaimed { amount },
        };
        outcome.events.push(WalletEvent {
            address: primary.clone(),
            tx_hash: record.tx_hash.clone(),
            block_height: record.block_height,
            contract: Some(record.contract.clone()),
            kind,
        });
    }
}

fn match_price_change(
    record: &PriceChangeRecord,
    watches: &[WatchSpec],
    outcome: &mut MatchOutcome,
) {
    for watch in watches {
        if watch.price_alert_percent <= 0.0 || watch.contract != record.contract {
            continue;
        }
        if record.change_percent.abs() >= watch.price_alert_percent {
            outcome.price_alerts.push(PriceAlert {
                chat_id: watch.chat_id,
                contract: watch.contract.clone(),
                label: watch.label.clone(),
                change_percent: record.change_percent,
                new_price: record.new_price.clone(),
            });
        }
    }
}
