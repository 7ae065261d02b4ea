#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! A crate containing code shared by the other crates in the workspace:
//!
//! * The domain models exchanged between the chain, indexer and store layers,
//!   such as [`MldsaHash`], [`Linkage`] and [`WalletEvent`].
//! * The [`DocumentStore`] persistence seam with its in-memory and
//!   filesystem backends.
//!
//! To avoid circular dependencies this crate must not depend on other crates
//! of the workspace.

pub mod amount;
mod error;
mod event;
mod model;
mod network;
mod store;

pub use crate::error::Error;
pub use crate::event::{Direction, EventKind, InferredSend, ReservationRole, WalletEvent};
pub use crate::model::{
    strip_hex_prefix, IdentityProjection, Linkage, MldsaHash, OutPoint, TrackedUtxo,
};
pub use crate::network::Network;
pub use crate::store::{DocumentStore, FileStore, MemoryStore};

/// Block height on the chain.
pub type Height = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;
