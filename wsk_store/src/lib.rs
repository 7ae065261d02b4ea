#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! Durable state of the wallet sentry: tracked subscriptions with their
//! identity linkages, the per-wallet UTXO set, the scan cursor, chat
//! authorization and paid access, token watches and per-wallet seen-contract
//! sets.
//!
//! The [`Store`] hydrates everything from a [`wsk_common::DocumentStore`] at
//! open and serves all reads from memory; every mutation is written through
//! to the backing documents before the cache changes.

mod error;
mod models;
mod store;

pub use crate::error::Error;
pub use crate::models::{
    AccessCode, AuthorizedChat, PaidSubscription, SeenContracts, Subscription, TokenKind,
    TokenWatch,
};
pub use crate::store::Store;
