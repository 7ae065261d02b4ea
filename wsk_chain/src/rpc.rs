use crate::model::{Block, Csv1Address, OwnerInfo, RpcUtxo};
use crate::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub(crate) const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client for the chain node.
///
/// A thin typed wrapper over HTTP POST; every call carries the caller-side
/// timeout, and a timeout surfaces as an ordinary transport error (the tick
/// aborts, the cursor stays).
#[derive(Debug)]
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    concurrency: usize,
}

/// A builder for the [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientBuilder {
    url: String,
    timeout: Duration,
    concurrency: usize,
}

impl RpcClientBuilder {
    pub fn new(url: &str) -> Self {
        RpcClientBuilder {
            url: url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the fan-out level for batched calls. Can't be 0, if 0 is passed 1
    /// will be used.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn build(self) -> Result<RpcClient, Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(RpcClient {
            client,
            url: self.url,
            next_id: AtomicU64::new(1),
            concurrency: self.concurrency,
        })
    }
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self, Error> {
        RpcClientBuilder::new(url).build()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, Error> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let response: RpcResponse<serde_json::Value> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(e) = response.error {
            return Err(Error::Rpc {
                code: e.code,
                message: e.message,
            });
        }
        // A null (or absent) result is legitimate for the Option-returning
        // methods and a type error for the others.
        let value = response.result.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Height of the chain tip.
    pub async fn block_number(&self) -> Result<u64, Error> {
        self.call("btc_blockNumber", [(); 0]).await
    }

    /// A block by height, with full transactions when `full_tx` is set.
    /// `None` when the node does not have the block (yet).
    pub async fn block_by_number(&self, height: u64, full_tx: bool) -> Result<Option<Block>, Error> {
        self.call("btc_getBlockByNumber", (height, full_tx)).await
    }

    /// The owner-info record behind an address, requesting the original
    /// public key so the resolver can derive the legacy forms.
    pub async fn public_key_info(&self, address: &str) -> Result<Option<OwnerInfo>, Error> {
        self.call("btc_getPublicKeyInfo", (address, true)).await
    }

    /// Confirmed or total native balance of an address, in satoshis.
    pub async fn balance(&self, address: &str, confirmed_only: bool) -> Result<u64, Error> {
        self.call("btc_getBalance", (address, confirmed_only)).await
    }

    /// The CSV-timelocked address form derived from `owner`'s identity.
    pub async fn csv1_address(&self, owner: &str) -> Result<Option<Csv1Address>, Error> {
        self.call("btc_getCSV1ForAddress", (owner,)).await
    }

    /// Current UTXO set of an address. `is_csv` selects the timelock path.
    pub async fn utxos(
        &self,
        address: &str,
        is_csv: bool,
        merge_pending: bool,
    ) -> Result<Vec<RpcUtxo>, Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct UtxoParams<'a> {
            address: &'a str,
            #[serde(rename = "isCSV")]
            is_csv: bool,
            #[serde(rename = "mergePendingUTXOs")]
            merge_pending: bool,
        }
        self.call(
            "btc_getUTXOs",
            (UtxoParams {
                address,
                is_csv,
                merge_pending,
            },),
        )
        .await
    }
}
