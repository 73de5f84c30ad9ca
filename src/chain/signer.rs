//! Deterministic per-chain funding account.

use k256::ecdsa::SigningKey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::client::{ChainClient, Coin, Fee, TxReceipt};
use crate::error::{Result, SpigotError};

/// The single funding account for one chain, derived from its configured
/// secret.
///
/// Derivation is deterministic and side-effect free: the same secret and
/// prefix always yield the same address. `submit` is the only capability
/// that mutates chain state; the dispatcher owns the signer and only ever
/// invokes it under the chain's gate.
pub struct ChainSigner {
    address: String,
}

impl ChainSigner {
    /// Derive the funding account from a hex-encoded secret.
    ///
    /// The address is the prefixed hash160 of the compressed public key.
    pub fn derive(secret_hex: &str, prefix: &str) -> Result<Self> {
        let secret = hex::decode(secret_hex.trim())
            .map_err(|e| SpigotError::Config(format!("invalid signer secret: {}", e)))?;
        let key = SigningKey::from_slice(&secret)
            .map_err(|e| SpigotError::Config(format!("invalid signer secret: {}", e)))?;

        let pubkey = key.verifying_key().to_encoded_point(true);
        let sha = Sha256::digest(pubkey.as_bytes());
        let hash = Ripemd160::digest(sha);

        Ok(Self {
            address: format!("{}1{}", prefix, hex::encode(hash)),
        })
    }

    /// The funding account's address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Submit one transfer from this account through the given client.
    pub async fn submit(
        &self,
        client: &dyn ChainClient,
        to: &str,
        amount: &[Coin],
        fee: &Fee,
    ) -> Result<TxReceipt> {
        client.send_tokens(&self.address, to, amount, fee).await
    }
}
