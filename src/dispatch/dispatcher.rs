//! Serialized transaction dispatch, one lane per chain.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::gate::DispatchGate;
use crate::chain::{ChainClient, ChainSigner, Coin, Fee, TxReceipt};
use crate::config::ChainProfile;
use crate::error::{Result, SpigotError};

/// Everything needed to move funds on one chain: the signing account, the
/// client it submits through, and the gate serializing its submissions.
struct ChainLane {
    signer: ChainSigner,
    client: Arc<dyn ChainClient>,
    gate: DispatchGate,
    amount: Vec<Coin>,
    fee: Fee,
}

/// Dispatcher serializing all outbound transfers per chain.
///
/// Lanes for different chains are independent and proceed concurrently;
/// within one lane submissions are strictly non-overlapping, so two
/// transfers never race the signer's transaction sequence. The dispatcher
/// never retries a failed submission; retries are caller policy.
pub struct TxDispatcher {
    lanes: DashMap<String, Arc<ChainLane>>,
}

impl TxDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            lanes: DashMap::new(),
        }
    }

    /// Register a chain lane. Called once per chain at startup.
    pub fn register(&self, profile: &ChainProfile, signer: ChainSigner, client: Arc<dyn ChainClient>) {
        let gate = DispatchGate::new(&profile.name, Duration::from_secs(profile.gate_wait_secs));
        let lane = ChainLane {
            signer,
            client,
            gate,
            amount: profile.transfer_amount.clone(),
            fee: profile.fee.clone(),
        };
        self.lanes.insert(profile.name.clone(), Arc::new(lane));
    }

    /// The funding account's address for a chain.
    pub fn sender_address(&self, chain: &str) -> Option<String> {
        self.lanes
            .get(chain)
            .map(|lane| lane.signer.address().to_string())
    }

    /// The funding account's balance in the chain's configured denom.
    pub async fn balance(&self, chain: &str) -> Result<Coin> {
        let lane = self.lane(chain)?;
        let denom = lane
            .amount
            .first()
            .map(|c| c.denom.as_str())
            .unwrap_or_default();
        lane.client.get_balance(lane.signer.address(), denom).await
    }

    /// Dispatch one transfer of the chain's configured amount to `to`.
    ///
    /// Blocks on the chain's gate up to its wait bound; a timed-out wait
    /// surfaces as `DispatcherBusy` with nothing submitted. While the gate
    /// is held the signer submits exactly once, and the gate is released on
    /// success and failure alike.
    pub async fn dispatch(&self, chain: &str, to: &str) -> Result<TxReceipt> {
        let lane = self.lane(chain)?;

        let _permit = lane.gate.acquire().await?;
        debug!(chain, to, "Gate acquired, submitting transfer");

        let receipt = lane
            .signer
            .submit(lane.client.as_ref(), to, &lane.amount, &lane.fee)
            .await?;

        info!(
            chain,
            to,
            tx_hash = %receipt.tx_hash,
            height = receipt.height,
            "Transfer submitted"
        );
        Ok(receipt)
    }

    // Clones the lane handle out of the map so no shard lock is held
    // across an await.
    fn lane(&self, chain: &str) -> Result<Arc<ChainLane>> {
        self.lanes
            .get(chain)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SpigotError::InvalidRequest(format!("chain [{}] is not supported", chain)))
    }
}

impl Default for TxDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    /// Client that sleeps inside the critical section and tracks how many
    /// submissions are in flight at once.
    struct SlowClient {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowClient {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainClient for SlowClient {
        async fn get_balance(&self, _address: &str, denom: &str) -> Result<Coin> {
            Ok(Coin {
                denom: denom.to_string(),
                amount: "1000000".to_string(),
            })
        }

        async fn send_tokens(
            &self,
            _from: &str,
            _to: &str,
            _amount: &[Coin],
            _fee: &Fee,
        ) -> Result<TxReceipt> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(TxReceipt {
                code: 0,
                tx_hash: "HASH".to_string(),
                height: 1,
            })
        }
    }

    fn profile(name: &str, gate_wait_secs: u64) -> ChainProfile {
        ChainProfile {
            name: name.to_string(),
            rpc_endpoint: "http://localhost:26657".to_string(),
            prefix: "test".to_string(),
            signer_secret: SECRET.to_string(),
            transfer_amount: vec![Coin {
                denom: "stake".to_string(),
                amount: "1000000".to_string(),
            }],
            fee: Fee {
                amount: vec![Coin {
                    denom: "stake".to_string(),
                    amount: "100".to_string(),
                }],
                gas: "200000".to_string(),
            },
            limits: Default::default(),
            gate_wait_secs,
        }
    }

    fn dispatcher_with(client: Arc<SlowClient>, profile: &ChainProfile) -> TxDispatcher {
        let dispatcher = TxDispatcher::new();
        let signer = ChainSigner::derive(&profile.signer_secret, &profile.prefix).unwrap();
        dispatcher.register(profile, signer, client);
        dispatcher
    }

    #[tokio::test]
    async fn test_unknown_chain_is_rejected() {
        let client = Arc::new(SlowClient::new(Duration::ZERO));
        let dispatcher = dispatcher_with(client, &profile("testnet", 60));

        let result = dispatcher.dispatch("mainnet", "test1qqqq").await;
        assert!(matches!(result, Err(SpigotError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_same_chain_submissions_never_overlap() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(40)));
        let dispatcher = Arc::new(dispatcher_with(client.clone(), &profile("testnet", 60)));

        let mut handles = Vec::new();
        for i in 0..4 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                dispatcher
                    .dispatch("testnet", &format!("test1dest{}", i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_chains_proceed_concurrently() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(40)));
        let dispatcher = Arc::new(TxDispatcher::new());
        for name in ["testnet", "devnet"] {
            let p = profile(name, 60);
            let signer = ChainSigner::derive(&p.signer_secret, &p.prefix).unwrap();
            dispatcher.register(&p, signer, client.clone());
        }

        let a = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch("testnet", "test1qqqq").await })
        };
        let b = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch("devnet", "test1qqqq").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gate_wait_expiry_is_busy() {
        // Submission outlives the gate bound, so a concurrent dispatch
        // gives up waiting.
        let client = Arc::new(SlowClient::new(Duration::from_secs(2)));
        let mut p = profile("testnet", 60);
        p.gate_wait_secs = 0;
        let dispatcher = Arc::new(dispatcher_with(client, &p));

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch("testnet", "test1qqqq").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = dispatcher.dispatch("testnet", "test1wwww").await;
        assert!(matches!(second, Err(SpigotError::DispatcherBusy(_))));

        first.abort();
    }

    #[tokio::test]
    async fn test_balance_uses_configured_denom() {
        let client = Arc::new(SlowClient::new(Duration::ZERO));
        let dispatcher = dispatcher_with(client, &profile("testnet", 60));

        let balance = dispatcher.balance("testnet").await.unwrap();
        assert_eq!(balance.denom, "stake");
    }

    #[tokio::test]
    async fn test_sender_address_is_exposed() {
        let client = Arc::new(SlowClient::new(Duration::ZERO));
        let dispatcher = dispatcher_with(client, &profile("testnet", 60));

        let address = dispatcher.sender_address("testnet").unwrap();
        assert!(address.starts_with("test1"));
        assert!(dispatcher.sender_address("mainnet").is_none());
    }
}
