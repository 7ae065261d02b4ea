use crate::consts;
use std::path::PathBuf;
use std::time::Duration;
use wsk_common::Network;

/// Resolved runtime settings of the service.
#[derive(Clone, Debug)]
pub struct Config {
    pub network: Network,

    /// Root of the document store.
    pub datadir: PathBuf,

    pub rpc_url: String,
    pub indexer_url: String,

    pub telegram_token: String,

    /// Legacy password gate; `None` leaves code redemption as the only door.
    pub bot_password: Option<String>,

    /// Chat receiving operational notices, when configured.
    pub admin_chat_id: Option<i64>,

    /// Explorer used for transaction links in messages.
    pub mempool_url: String,

    pub poll_interval: Duration,
    pub max_wallets_per_chat: usize,
    pub timeout: Duration,
}

impl Config {
    pub fn default_mainnet(datadir: PathBuf, telegram_token: String) -> Self {
        Self {
            network: Network::Mainnet,
            datadir,
            rpc_url: "https://rpc.opbnet.org".into(),
            indexer_url: "https://indexer.opbnet.org".into(),
            telegram_token,
            bot_password: None,
            admin_chat_id: None,
            mempool_url: "https://mempool.space".into(),
            poll_interval: consts::POLL_INTERVAL,
            max_wallets_per_chat: consts::MAX_WALLETS_PER_CHAT,
            timeout: consts::IO_TIMEOUT,
        }
    }

    pub fn default_testnet(datadir: PathBuf, telegram_token: String) -> Self {
        Self {
            network: Network::Testnet,
            rpc_url: "https://testnet-rpc.opbnet.org".into(),
            indexer_url: "https://testnet-indexer.opbnet.org".into(),
            mempool_url: "https://mempool.space/testnet".into(),
            ..Self::default_mainnet(datadir, telegram_token)
        }
    }

    /// For regtest there are no reasonable defaults for the endpoints; the
    /// caller supplies both.
    pub fn default_regtest(
        rpc_url: &str,
        indexer_url: &str,
        datadir: PathBuf,
        telegram_token: String,
    ) -> Self {
        Self {
            network: Network::Regtest,
            rpc_url: rpc_url.into(),
            indexer_url: indexer_url.into(),
            mempool_url: "http://localhost:8083".into(),
            ..Self::default_mainnet(datadir, telegram_token)
        }
    }
}
