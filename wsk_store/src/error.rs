#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error(transparent)]
    Persist(#[from] wsk_common::Error),

    #[error(transparent)]
    JsonFrom(#[from] serde_json::Error),

    #[error("Already tracking this wallet as {address}")]
    AlreadyTracking { address: String },

    #[error("Wallet limit reached ({0} per chat)")]
    WalletLimitReached(usize),

    #[error("No tracked wallet with id {0}")]
    SubscriptionNotFound(String),

    #[error("Already watching contract {contract}")]
    AlreadyWatching { contract: String },

    #[error("No token watch with id {0}")]
    TokenWatchNotFound(String),

    #[error("Access codes look like JT-XXXXXXXXXXXX")]
    MalformedCode,

    #[error("Unknown access code")]
    UnknownCode,

    #[error("This access code has expired")]
    CodeExpired,

    #[error("This access code was already redeemed")]
    CodeAlreadyRedeemed,

    #[error("A UTXO must have a positive value")]
    ZeroValueUtxo,
}
