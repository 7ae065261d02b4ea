//! Grouping and rendering of wallet events into chat messages, and the
//! subscription-gated dispatch to subscribers.

use crate::telegram::TelegramClient;
use crate::Error;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wsk_common::amount::format_btc;
use wsk_common::{Direction, EventKind, ReservationRole, Timestamp, WalletEvent};
use wsk_indexer::{PriceAlert, ReservationAlert};
use wsk_store::Store;

/// All events of one transaction for one wallet, rendered as one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGroup {
    pub address: String,
    pub tx_hash: String,
    pub block_height: u64,
    pub events: Vec<WalletEvent>,
}

/// Group events by `(address, tx_hash)`, preserving first-appearance order.
pub fn group_events(events: &[WalletEvent]) -> Vec<EventGroup> {
    let mut groups: Vec<EventGroup> = vec![];
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for event in events {
        let key = (event.address.clone(), event.tx_hash.clone());
        match index.get(&key) {
            Some(&i) => groups[i].events.push(event.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(EventGroup {
                    address: event.address.clone(),
                    tx_hash: event.tx_hash.clone(),
                    block_height: event.block_height,
                    events: vec![event.clone()],
                });
            }
        }
    }
    groups
}

/// Shorten for display. Indexed by character, never by byte: these strings
/// come from user input, the indexer and the chain RPC.
fn short(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 14 {
        value.to_string()
    } else {
        let prefix: String = chars[..8].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{prefix}…{suffix}")
    }
}

fn format_units(amount: u128) -> String {
    amount.to_string()
}

fn render_event(event: &WalletEvent) -> String {
    let contract = event.contract.as_deref().map(short).unwrap_or_default();
    match &event.kind {
        EventKind::BtcSent {
            satoshis,
            counterparty,
            recipient_amount,
        } => {
            let mut line = format!("📤 BTC Sent: {}", format_btc(*satoshis));
            if let (Some(to), Some(amount)) = (counterparty, recipient_amount) {
                line.push_str(&format!("\nTo: `{}` ({})", short(to), format_btc(*amount)));
            }
            line
        }
        EventKind::BtcReceived { satoshis } => {
            format!("📥 BTC Received: {}", format_btc(*satoshis))
        }
        EventKind::Token { direction, amount } => match direction {
            Direction::In => format!("🪙 Received {} `{contract}`", format_units(*amount)),
            Direction::Out => format!("🪙 Sent {} `{contract}`", format_units(*amount)),
        },
        EventKind::NftTransfer { direction, amount } => match direction {
            Direction::In => format!("🖼 Received {} NFT `{contract}`", format_units(*amount)),
            Direction::Out => format!("🖼 Sent {} NFT `{contract}`", format_units(*amount)),
        },
        EventKind::LiquidityReserved {
            role,
            satoshis,
            token_amount,
        } => {
            let side = match role {
                ReservationRole::Buyer => "buy",
                ReservationRole::Seller => "sell",
            };
            format!(
                "🧊 Liquidity Reserved ({side}): {} for {} `{contract}`",
                format_btc(*satoshis),
                format_units(*token_amount)
            )
        }
        EventKind::ProviderConsumed {
            satoshis,
            token_amount,
        } => format!(
            "🤝 Liquidity Consumed: sold {} `{contract}` for {}",
            format_units(*token_amount),
            format_btc(*satoshis)
        ),
        EventKind::SwapExecuted {
            btc_spent,
            tokens_received,
        } => format!(
            "🔄 Swap Executed\nBTC Spent: {}\nReceived: {} `{contract}`",
            format_btc(*btc_spent),
            format_units(*tokens_received)
        ),
        EventKind::LiquidityAdded {
            satoshis,
            token_amount,
        } => format!(
            "➕ Liquidity Added: {} + {} `{contract}`",
            format_btc(*satoshis),
            format_units(*token_amount)
        ),
        EventKind::LiquidityRemoved {
            satoshis,
            token_amount,
        } => format!(
            "➖ Liquidity Removed: {} + {} `{contract}`",
            format_btc(*satoshis),
            format_units(*token_amount)
        ),
        EventKind::Staked { amount } => {
            format!("🔒 Staked {} `{contract}`", format_units(*amount))
        }
        EventKind::Unstaked { amount } => {
            format!("🔓 Unstaked {} `{contract}`", format_units(*amount))
        }
        EventKind::RewardsClaimed { amount } => {
            format!("🎁 Rewards Claimed: {} `{contract}`", format_units(*amount))
        }
    }
}

/// Render one group as a chat message, summarizing the recognized composite
/// shapes into a single headline instead of one line per raw event.
pub fn render_group(group: &EventGroup, label: &str, mempool_url: &str) -> String {
    let mut body = render_body(group);
    body.push_str(&format!(
        "\n[tx](<{mempool_url}/tx/{}>) · block {}",
        group.tx_hash, group.block_height
    ));
    format!("*{label}* `{}`\n{body}", short(&group.address))
}

fn render_body(group: &EventGroup) -> String {
    let swap = group
        .events
        .iter()
        .find(|e| matches!(e.kind, EventKind::SwapExecuted { .. }));
    let change: u64 = group
        .events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::BtcReceived { satoshis } => Some(satoshis),
            _ => None,
        })
        .sum();
    let sent: Vec<&WalletEvent> = group
        .events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::BtcSent { .. }))
        .collect();

    if let Some(swap) = swap {
        // swap_executed.btcSpent is already the net cost; token legs of the
        // same contract are the swap itself
        let mut body = render_event(swap);
        if change > 0 {
            body.push_str(&format!("\nChange: {}", format_btc(change)));
        }
        for event in &group.events {
            if std::ptr::eq(event, swap) {
                continue;
            }
            match &event.kind {
                EventKind::BtcSent { .. } | EventKind::BtcReceived { .. } => {}
                EventKind::Token { .. } | EventKind::NftTransfer { .. }
                    if event.contract == swap.contract => {}
                _ => {
                    body.push('\n');
                    body.push_str(&render_event(event));
                }
            }
        }
        return body;
    }

    let token_in = group
        .events
        .iter()
        .any(|e| e.kind.direction() == Some(Direction::In));
    let token_out = group
        .events
        .iter()
        .any(|e| e.kind.direction() == Some(Direction::Out));
    if token_in && token_out {
        let mut body = "🔄 Token Swap".to_string();
        for event in &group.events {
            body.push('\n');
            body.push_str(&render_event(event));
        }
        return body;
    }

    if !sent.is_empty() && group.events.iter().all(|e| e.kind.is_btc()) {
        let inputs: u64 = sent
            .iter()
            .map(|e| match e.kind {
                EventKind::BtcSent { satoshis, .. } => satoshis,
                _ => 0,
            })
            .sum();
        let counterparty = sent.iter().find_map(|e| match &e.kind {
            EventKind::BtcSent {
                counterparty: Some(to),
                recipient_amount,
                ..
            } => Some((to.clone(), recipient_amount.unwrap_or(0))),
            _ => None,
        });

        return match counterparty {
            None => {
                // everything stayed inside the wallet
                let fee = inputs.saturating_sub(change);
                format!(
                    "↩️ Internal Transfer\nMoved: {}\nFee: {}",
                    format_btc(change),
                    format_btc(fee)
                )
            }
            Some((to, recipient)) => {
                let fee = inputs.saturating_sub(recipient).saturating_sub(change);
                let mut body = format!(
                    "📤 BTC Sent\nTo: `{}`\nAmount: {}",
                    short(&to),
                    format_btc(recipient)
                );
                if change > 0 {
                    body.push_str(&format!("\nChange: {}", format_btc(change)));
                }
                if fee > 0 {
                    body.push_str(&format!("\nFee: {}", format_btc(fee)));
                }
                body
            }
        };
    }

    group
        .events
        .iter()
        .map(render_event)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_price_alert(alert: &PriceAlert) -> String {
    format!(
        "📈 *{}* moved {:+.1}% — price now {}",
        alert.label, alert.change_percent, alert.new_price
    )
}

pub fn render_reservation_alert(alert: &ReservationAlert) -> String {
    format!(
        "🧊 *{}*: reservation of {} ({} tokens)",
        alert.label,
        format_btc(alert.satoshis),
        alert.token_amount
    )
}

const EXPIRY_NOTICE: &str =
    "⚠️ Your subscription has expired. Renew with /redeem to keep receiving alerts.";

/// Delivers rendered messages to subscribed chats behind the paid gate.
///
/// A chat whose paid subscription lapsed gets a single expiry notice per
/// process lifetime and is then silenced until it renews.
pub struct Notifier {
    telegram: Arc<TelegramClient>,
    store: Arc<Store>,
    mempool_url: String,
    notified_expired: HashSet<i64>,
}

impl Notifier {
    pub fn new(telegram: Arc<TelegramClient>, store: Arc<Store>, mempool_url: String) -> Self {
        Notifier {
            telegram,
            store,
            mempool_url,
            notified_expired: HashSet::new(),
        }
    }

    /// Send `text` to a chat iff its paid subscription is live; otherwise
    /// deliver the one-time expiry notice.
    async fn send_gated(&mut self, chat_id: i64, text: &str, now: Timestamp) -> Result<(), Error> {
        if self.store.has_active_subscription(chat_id, now) {
            self.telegram.send_message(chat_id, text).await?;
        } else if self.notified_expired.insert(chat_id) {
            self.telegram.send_message(chat_id, EXPIRY_NOTICE).await?;
        }
        Ok(())
    }

    /// Group and deliver one tick's surviving events.
    pub async fn dispatch_events(
        &mut self,
        events: &[WalletEvent],
        now: Timestamp,
    ) -> Result<(), Error> {
        for group in group_events(events) {
            for sub in self.store.subscriptions_for_address(&group.address) {
                let text = render_group(&group, &sub.label, &self.mempool_url);
                self.send_gated(sub.chat_id, &text, now).await?;
            }
        }
        Ok(())
    }

    pub async fn dispatch_price_alerts(
        &mut self,
        alerts: &[PriceAlert],
        now: Timestamp,
    ) -> Result<(), Error> {
        for alert in alerts {
            self.send_gated(alert.chat_id, &render_price_alert(alert), now)
                .await?;
        }
        Ok(())
    }

    pub async fn dispatch_reservation_alerts(
        &mut self,
        alerts: &[ReservationAlert],
        now: Timestamp,
    ) -> Result<(), Error> {
        for alert in alerts {
            self.send_gated(alert.chat_id, &render_reservation_alert(alert), now)
                .await?;
        }
        Ok(())
    }
}
