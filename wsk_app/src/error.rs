#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store Error: {0}")]
    Store(#[from] wsk_store::Error),

    #[error("Chain Error: {0}")]
    Chain(#[from] wsk_chain::Error),

    #[error("Indexer Error: {0}")]
    Indexer(#[from] wsk_indexer::Error),

    #[error("{0}")]
    Common(#[from] wsk_common::Error),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serde JSON Error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("{0}")]
    Generic(String),
}
