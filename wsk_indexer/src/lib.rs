#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! Client and matcher for the indexer HTTP API, the semantic source for
//! contract-level activity: OP20 transfers, NativeSwap reservations and
//! swaps, pool and staking events, and price changes.

mod client;
mod error;
mod matcher;
pub mod model;

pub use crate::client::{IndexerClient, IndexerClientBuilder};
pub use crate::error::Error;
pub use crate::matcher::{
    match_batch, MatchOutcome, PriceAlert, ReservationAlert, WatchSpec,
};
