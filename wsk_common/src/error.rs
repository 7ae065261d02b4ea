#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error(transparent)]
    JsonFrom(#[from] serde_json::Error),

    #[error(transparent)]
    StdIOError(#[from] std::io::Error),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid identity hash \"{0}\", must be 32 bytes of hex")]
    InvalidIdentityHash(String),

    #[error("Invalid amount \"{0}\"")]
    InvalidAmount(String),

    #[error("Invalid network \"{0}\", must be one of mainnet, testnet, regtest")]
    InvalidNetwork(String),

    #[error("Invalid outpoint \"{0}\", must be \"txid:vout\"")]
    InvalidOutPoint(String),
}
