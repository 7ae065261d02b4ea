#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! The wallet sentry service: ties the store, the chain RPC and the indexer
//! together into the per-tick ingestion pipeline, renders surviving events
//! into chat messages, and serves the slash-command surface.

mod app;
mod commands;
mod config;
pub mod consts;
mod error;
mod events;
mod history;
mod pipeline;
mod telegram;

pub use crate::app::App;
pub use crate::commands::CommandHandler;
pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::events::{
    group_events, render_group, render_price_alert, render_reservation_alert, EventGroup,
    Notifier,
};
pub use crate::pipeline::{
    dedup_events, filter_suppressed, promote_inferred, suppression_set, Poller,
};
pub use crate::telegram::{TelegramClient, TgChat, TgMessage, TgUpdate};
