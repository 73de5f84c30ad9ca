//! Chain access: the client boundary and the per-chain signing account.

mod client;
mod signer;

pub use client::{ChainClient, Coin, Fee, RpcChainClient, TxReceipt};
pub use signer::ChainSigner;
