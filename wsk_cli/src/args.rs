use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

/// Real-time wallet surveillance for an OP-chain: watches tracked wallets
/// block by block and notifies subscribed Telegram chats.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Network
    #[arg(short, long, env = "NETWORK", value_enum, default_value = "mainnet")]
    pub network: Network,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: String,

    /// Legacy password gate; unset disables password authorization
    #[arg(long, env = "BOT_PASSWORD", hide_env_values = true)]
    pub bot_password: Option<String>,

    /// Chain JSON-RPC endpoint; defaults per network, required on regtest
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Indexer HTTP endpoint; defaults per network, required on regtest
    #[arg(long, env = "INDEXER_URL")]
    pub indexer_url: Option<String>,

    /// Explorer used for transaction links
    #[arg(long, env = "MEMPOOL_URL")]
    pub mempool_url: Option<String>,

    /// Chat receiving operational notices
    #[arg(long, env = "ADMIN_CHAT_ID")]
    pub admin_chat_id: Option<i64>,

    /// Pause between pipeline ticks, milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Cap of tracked wallets per chat
    #[arg(long, env = "MAX_WALLETS_PER_USER")]
    pub max_wallets_per_user: Option<usize>,

    /// Root directory of the document store
    #[arg(long, env = "WSK_DATADIR")]
    pub datadir: Option<PathBuf>,
}
