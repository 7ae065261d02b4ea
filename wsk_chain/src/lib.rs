#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! Chain access for the wallet sentry: a typed JSON-RPC client for the node,
//! the cross-format identity resolver, UTXO-set seeding and the per-block
//! scanner producing native-coin events.

mod error;
pub mod model;
mod resolver;
mod rpc;
mod scanner;
mod tracker;

pub use crate::error::Error;
pub use crate::resolver::resolve;
pub use crate::rpc::{RpcClient, RpcClientBuilder};
pub use crate::scanner::{scan_block, BlockScan};
pub use crate::tracker::seed_utxos;
