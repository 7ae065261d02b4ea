use crate::model::{BalanceEntry, EventsBatch, Listings, Prices, ReservationRecord, TransferRecord};
use crate::Error;
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A client for the indexer HTTP API, the semantic source for contract-level
/// activity.
#[derive(Debug)]
pub struct IndexerClient {
    client: reqwest::Client,
    base_url: String,
}

/// A builder for the [`IndexerClient`].
#[derive(Debug, Clone)]
pub struct IndexerClientBuilder {
    base_url: String,
    timeout: Duration,
}

impl IndexerClientBuilder {
    pub fn new(base_url: &str) -> Self {
        IndexerClientBuilder {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<IndexerClient, Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(IndexerClient {
            client,
            base_url: self.base_url,
        })
    }
}

impl IndexerClient {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        IndexerClientBuilder::new(base_url).build()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status().as_u16();
        // going through text rather than straight json so a shape mismatch
        // leaves something to debug with
        let body = response.text().await?;
        if status != 200 {
            return Err(Error::Status { status, body });
        }
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("error {e:?} in converting following text:\n{body}");
                Err(e.into())
            }
        }
    }

    /// Everything the indexer saw from block `since` up to its tip.
    pub async fn events_since(&self, since: u64) -> Result<EventsBatch, Error> {
        self.get_json("/events", &[("since", since.to_string())])
            .await
    }

    /// Fungible balances of an identity, one entry per contract.
    pub async fn balances(&self, address: &str) -> Result<Vec<BalanceEntry>, Error> {
        self.get_json(&format!("/balances/{address}"), &[]).await
    }

    /// The NativeSwap provider queues of a contract.
    pub async fn listings(&self, contract: &str) -> Result<Listings, Error> {
        self.get_json(&format!("/listings/{contract}"), &[]).await
    }

    /// Current virtual reserves and recent price moves of a contract.
    pub async fn prices(&self, contract: &str) -> Result<Prices, Error> {
        self.get_json(&format!("/prices/{contract}"), &[]).await
    }

    pub async fn reservations(
        &self,
        status: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ReservationRecord>, Error> {
        let mut query = vec![];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.get_json("/reservations", &query).await
    }

    /// Historic transfers of an identity, newest first.
    pub async fn transfers(
        &self,
        mldsa_hash: &str,
        limit: u32,
        skip: u32,
    ) -> Result<Vec<TransferRecord>, Error> {
        self.get_json(
            &format!("/transfers/{mldsa_hash}"),
            &[("limit", limit.to_string()), ("skip", skip.to_string())],
        )
        .await
    }
}
