//! Slash-command surface: subscription lifecycle, access control and the
//! on-demand balance queries. Validation failures never reach the pipeline;
//! they answer the chat with a single line.

use crate::consts::{BALANCE_COOLDOWN, PORTFOLIO_COOLDOWN};
use crate::history::spawn_history_scan;
use crate::pipeline::unix_now;
use crate::telegram::{TelegramClient, TgUpdate};
use crate::Error;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wsk_chain::RpcClient;
use wsk_common::amount::format_btc;
use wsk_common::Network;
use wsk_indexer::IndexerClient;
use wsk_store::{Store, TokenKind};

const HELP: &str = "\
*Wallet Sentry*
/track `<address>` `[label]` — watch a wallet
/untrack `<id>` — stop watching
/list — your wallets and token watches
/watchtoken `<contract>` `[label]` `[alert%]` `[min_sats]` `[nft]`
/unwatchtoken `<id>`
/balance — balances of your wallets
/portfolio — portfolio rollup
/redeem `<code>` — redeem an access code
";

pub struct CommandHandler {
    store: Arc<Store>,
    rpc: Arc<RpcClient>,
    indexer: Arc<IndexerClient>,
    telegram: Arc<TelegramClient>,
    network: Network,
    bot_password: Option<String>,
    max_wallets_per_chat: usize,

    /// Per-(chat, command) last-use instants backing the rate limits.
    last_use: HashMap<(i64, &'static str), Instant>,
}

impl CommandHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        rpc: Arc<RpcClient>,
        indexer: Arc<IndexerClient>,
        telegram: Arc<TelegramClient>,
        network: Network,
        bot_password: Option<String>,
        max_wallets_per_chat: usize,
    ) -> Self {
        CommandHandler {
            store,
            rpc,
            indexer,
            telegram,
            network,
            bot_password,
            max_wallets_per_chat,
            last_use: HashMap::new(),
        }
    }

    /// Process one long-poll update end to end, replying inline.
    pub async fn handle_update(&mut self, update: &TgUpdate) {
        if let Some(callback) = &update.callback_query {
            if let Err(e) = self.telegram.answer_callback_query(&callback.id, "").await {
                log::debug!("answering callback failed: {e}");
            }
        }

        let Some(message) = &update.message else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        if !text.starts_with('/') {
            return;
        }
        let chat_id = message.chat.id;

        let reply = match self.dispatch(chat_id, text).await {
            Ok(reply) => reply,
            // user-facing single lines; the pipeline never sees these
            Err(Error::Store(e)) => e.to_string(),
            Err(Error::Generic(message)) => message,
            Err(Error::Chain(_)) | Err(Error::Indexer(_)) | Err(Error::Reqwest(_)) => {
                "Temporarily unavailable, try again in a moment.".to_string()
            }
            Err(e) => {
                log::warn!("command from {chat_id} failed: {e}");
                "Something went wrong.".to_string()
            }
        };
        if let Err(e) = self.telegram.send_message(chat_id, &reply).await {
            log::warn!("replying to chat {chat_id} failed: {e}");
        }
    }

    async fn dispatch(&mut self, chat_id: i64, text: &str) -> Result<String, Error> {
        let mut parts = text.split_whitespace();
        let command = parts
            .next()
            .map(|c| c.split('@').next().unwrap_or(c))
            .unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match command {
            "/start" => self.cmd_start(chat_id, &args),
            "/redeem" => self.cmd_redeem(chat_id, &args),
            "/track" => self.cmd_track(chat_id, &args).await,
            "/untrack" => self.cmd_untrack(chat_id, &args),
            "/list" => self.cmd_list(chat_id),
            "/watchtoken" => self.cmd_watchtoken(chat_id, &args),
            "/unwatchtoken" => self.cmd_unwatchtoken(chat_id, &args),
            "/balance" => self.cmd_balance(chat_id).await,
            "/portfolio" => self.cmd_portfolio(chat_id).await,
            _ => Ok(HELP.to_string()),
        }
    }

    fn require_authorized(&self, chat_id: i64) -> Result<(), Error> {
        if self.store.is_authorized(chat_id) {
            Ok(())
        } else {
            Err(Error::Generic(
                "Not authorized. Use /start <password> or /redeem <code> first.".to_string(),
            ))
        }
    }

    /// Remaining cooldown for a rate-limited command, updating the
    /// last-use instant when the command may run.
    fn check_rate(&mut self, chat_id: i64, command: &'static str, cooldown: Duration) -> Option<u64> {
        let now = Instant::now();
        if let Some(last) = self.last_use.get(&(chat_id, command)) {
            let elapsed = now.duration_since(*last);
            if elapsed < cooldown {
                return Some((cooldown - elapsed).as_secs().max(1));
            }
        }
        self.last_use.insert((chat_id, command), now);
        None
    }

    fn cmd_start(&self, chat_id: i64, args: &[&str]) -> Result<String, Error> {
        if let (Some(password), Some(supplied)) = (self.bot_password.as_deref(), args.first()) {
            if password == *supplied {
                self.store.authorize_chat(chat_id, unix_now())?;
                return Ok("Authorized. Use /track to start watching wallets.".to_string());
            }
            return Err(Error::Generic("Wrong password.".to_string()));
        }
        Ok(HELP.to_string())
    }

    fn cmd_redeem(&self, chat_id: i64, args: &[&str]) -> Result<String, Error> {
        let code = args
            .first()
            .ok_or_else(|| Error::Generic("Usage: /redeem JT-XXXXXXXXXXXX".to_string()))?;
        let paid = self.store.redeem_code(code, chat_id, unix_now())?;
        let days = (paid.expires_at.saturating_sub(unix_now())) / 86_400;
        Ok(format!("Subscription active, {days} days remaining."))
    }

    async fn cmd_track(&mut self, chat_id: i64, args: &[&str]) -> Result<String, Error> {
        self.require_authorized(chat_id)?;
        let address = args
            .first()
            .ok_or_else(|| Error::Generic("Usage: /track <address> [label]".to_string()))?;
        let label = if args.len() > 1 {
            args[1..].join(" ")
        } else {
            // chars, not bytes: the address is raw user input
            format!("wallet-{}", address.chars().take(6).collect::<String>())
        };

        // resolve before inserting so the cross-format duplicate check can
        // name the address already on file; failures leave the linkage to
        // the pipeline's per-tick retry
        let linkage = match wsk_chain::resolve(&self.rpc, self.network, address).await {
            Ok(linkage) => linkage,
            Err(e) => {
                log::warn!("resolving {address} at track time failed: {e}");
                None
            }
        };

        let sub = self.store.track(
            chat_id,
            address,
            &label,
            linkage.clone(),
            self.max_wallets_per_chat,
            unix_now(),
        )?;

        if let Some(linkage) = linkage {
            spawn_history_scan(
                self.store.clone(),
                self.indexer.clone(),
                sub.address.clone(),
                linkage.mldsa_hash,
            );
        }
        Ok(format!("Now tracking *{label}* (`{}`). Id: `{}`", sub.address, sub.id))
    }

    fn cmd_untrack(&self, chat_id: i64, args: &[&str]) -> Result<String, Error> {
        let id = args
            .first()
            .ok_or_else(|| Error::Generic("Usage: /untrack <id>".to_string()))?;
        let sub = self.store.untrack(chat_id, id)?;
        Ok(format!("Stopped tracking *{}* (`{}`).", sub.label, sub.address))
    }

    fn cmd_list(&self, chat_id: i64) -> Result<String, Error> {
        let subs = self.store.subscriptions(chat_id);
        let watches = self.store.token_watches(chat_id);
        if subs.is_empty() && watches.is_empty() {
            return Ok("Nothing tracked yet. Use /track <address>.".to_string());
        }

        let mut out = String::new();
        if !subs.is_empty() {
            out.push_str("*Wallets*\n");
            for sub in subs {
                let resolved = if sub.linkage.is_some() { "" } else { " (resolving)" };
                out.push_str(&format!("`{}` {} — `{}`{resolved}\n", sub.id, sub.label, sub.address));
            }
        }
        if !watches.is_empty() {
            out.push_str("*Token watches*\n");
            for watch in watches {
                out.push_str(&format!("`{}` {} — `{}`\n", watch.id, watch.label, watch.contract));
            }
        }
        Ok(out)
    }

    fn cmd_watchtoken(&self, chat_id: i64, args: &[&str]) -> Result<String, Error> {
        self.require_authorized(chat_id)?;
        let usage = "Usage: /watchtoken <contract> [label] [alert%] [min_sats] [nft]";
        let contract = args
            .first()
            .ok_or_else(|| Error::Generic(usage.to_string()))?;
        let label = args.get(1).unwrap_or(&"token").to_string();
        let percent: f64 = match args.get(2) {
            Some(raw) => raw
                .trim_end_matches('%')
                .parse()
                .map_err(|_| Error::Generic(usage.to_string()))?,
            None => 0.0,
        };
        let min_sats: u64 = match args.get(3) {
            Some(raw) => raw.parse().map_err(|_| Error::Generic(usage.to_string()))?,
            None => 0,
        };
        let kind = if args.get(4) == Some(&"nft") {
            TokenKind::Nft
        } else {
            TokenKind::Fungible
        };

        let watch = self
            .store
            .add_token_watch(chat_id, contract, &label, kind, percent, min_sats)?;
        Ok(format!("Watching *{}* (`{}`). Id: `{}`", watch.label, watch.contract, watch.id))
    }

    fn cmd_unwatchtoken(&self, chat_id: i64, args: &[&str]) -> Result<String, Error> {
        let id = args
            .first()
            .ok_or_else(|| Error::Generic("Usage: /unwatchtoken <id>".to_string()))?;
        let watch = self.store.remove_token_watch(chat_id, id)?;
        Ok(format!("Stopped watching *{}*.", watch.label))
    }

    async fn cmd_balance(&mut self, chat_id: i64) -> Result<String, Error> {
        self.require_authorized(chat_id)?;
        if let Some(wait) = self.check_rate(chat_id, "balance", BALANCE_COOLDOWN) {
            return Ok(format!("Easy there — try again in {wait}s."));
        }
        let subs = self.store.subscriptions(chat_id);
        if subs.is_empty() {
            return Ok("Nothing tracked yet. Use /track <address>.".to_string());
        }

        let mut out = String::new();
        for sub in subs {
            let sats = self.wallet_sats(&sub).await?;
            out.push_str(&format!("*{}*: {}\n", sub.label, format_btc(sats)));
            if let Some(linkage) = &sub.linkage {
                let hash = linkage.mldsa_hash.to_string();
                for entry in self.indexer.balances(&hash).await? {
                    if self.store.seen_contracts(&sub.address).contains(&entry.contract) {
                        let symbol = entry.symbol.as_deref().unwrap_or("units");
                        out.push_str(&format!("  {} {symbol}\n", entry.amount));
                    }
                }
            }
        }
        Ok(out)
    }

    async fn cmd_portfolio(&mut self, chat_id: i64) -> Result<String, Error> {
        self.require_authorized(chat_id)?;
        if let Some(wait) = self.check_rate(chat_id, "portfolio", PORTFOLIO_COOLDOWN) {
            return Ok(format!("Easy there — try again in {wait}s."));
        }
        let subs = self.store.subscriptions(chat_id);
        if subs.is_empty() {
            return Ok("Nothing tracked yet. Use /track <address>.".to_string());
        }

        let mut total = 0u64;
        let count = subs.len();
        for sub in &subs {
            total += self.wallet_sats(sub).await?;
        }
        Ok(format!(
            "*Portfolio*: {count} wallets, {} total",
            format_btc(total)
        ))
    }

    /// Confirmed native balance of a subscription across its linked forms.
    async fn wallet_sats(&self, sub: &wsk_store::Subscription) -> Result<u64, Error> {
        let mut total = self.rpc.balance(&sub.address, true).await?;
        if let Some(linkage) = &sub.linkage {
            for alias in linkage.addresses() {
                if alias != sub.address {
                    total += self.rpc.balance(alias, true).await?;
                }
            }
        }
        Ok(total)
    }
}
