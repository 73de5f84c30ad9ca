//! Chain client abstraction and its HTTP gateway implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SpigotError};

/// A denominated token amount. Amounts are decimal strings, as chains
/// commonly exceed u64 range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// Fee attached to a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas: String,
}

/// Receipt returned by the chain for an accepted transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Chain-level result code; 0 means accepted
    pub code: u32,
    /// Transaction hash
    pub tx_hash: String,
    /// Block height the transaction landed in
    pub height: u64,
}

/// Trait for chain access.
///
/// Implementations perform the actual network round-trips. Their errors are
/// opaque to the rest of the service: callers wrap them, never inspect them.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Query the balance of `address` for one denom.
    async fn get_balance(&self, address: &str, denom: &str) -> Result<Coin>;

    /// Broadcast a transfer of `amount` from `from` to `to`.
    ///
    /// Suspends the caller until the network round-trip completes. Must only
    /// be invoked through the signer binding, under the dispatch gate.
    async fn send_tokens(&self, from: &str, to: &str, amount: &[Coin], fee: &Fee)
        -> Result<TxReceipt>;
}

/// HTTP client for a chain gateway endpoint.
pub struct RpcChainClient {
    endpoint: String,
    http: reqwest::Client,
}

impl RpcChainClient {
    /// Create a client for the given gateway endpoint.
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct TransferBody<'a> {
    from: &'a str,
    to: &'a str,
    amount: &'a [Coin],
    fee: &'a Fee,
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_balance(&self, address: &str, denom: &str) -> Result<Coin> {
        let url = format!("{}/bank/balances/{}/{}", self.endpoint, address, denom);
        debug!(url = %url, "Querying balance");

        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json::<Coin>().await?)
    }

    async fn send_tokens(
        &self,
        from: &str,
        to: &str,
        amount: &[Coin],
        fee: &Fee,
    ) -> Result<TxReceipt> {
        let url = format!("{}/txs", self.endpoint);
        let body = TransferBody {
            from,
            to,
            amount,
            fee,
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpigotError::Submission(e.to_string()))?
            .error_for_status()
            .map_err(|e| SpigotError::Submission(e.to_string()))?;

        let receipt: TxReceipt = response
            .json()
            .await
            .map_err(|e| SpigotError::Submission(e.to_string()))?;

        if receipt.code != 0 {
            return Err(SpigotError::Submission(format!(
                "broadcast rejected with code {}",
                receipt.code
            )));
        }

        Ok(receipt)
    }
}
