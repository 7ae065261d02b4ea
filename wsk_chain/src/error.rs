#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error(transparent)]
    Common(#[from] wsk_common::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    JsonFrom(#[from] serde_json::Error),

    #[error("RPC returned error {code}: {message}")]
    Rpc { code: i64, message: String },
}
