use std::time::Duration;

/// Default pause between pipeline ticks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default cap of tracked wallets per chat.
pub const MAX_WALLETS_PER_CHAT: usize = 20;

/// Caller-side timeout on RPC and indexer calls.
pub const IO_TIMEOUT: Duration = Duration::from_secs(20);

/// Blocks fetched and scanned per batch within a tick.
pub const BLOCK_BATCH: usize = 10;

/// Capacity of the session-scoped notified-transaction LRU.
pub const SESSION_LRU_CAP: usize = 1000;

/// Minimum pause between uses of the balance command per chat.
pub const BALANCE_COOLDOWN: Duration = Duration::from_secs(10);

/// Minimum pause between uses of the portfolio command per chat.
pub const PORTFOLIO_COOLDOWN: Duration = Duration::from_secs(30);

/// Long-poll horizon for the command loop, seconds.
pub const UPDATES_TIMEOUT_S: u64 = 30;
