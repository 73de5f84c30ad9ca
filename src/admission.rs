//! Request admission pipeline: validation, multi-key limits, dispatch,
//! bookkeeping.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::chain::TxReceipt;
use crate::config::SpigotConfig;
use crate::dispatch::TxDispatcher;
use crate::error::SpigotError;
use crate::ratelimit::{FrequencyChecker, GrantKey};

/// A transfer request, decoded and source-attributed by the HTTP layer.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Target chain name
    pub chain: String,
    /// Destination address
    pub address: String,
    /// Requester's source IP
    pub ip: String,
    /// Requester's external identity id
    pub identity: String,
}

/// Terminal outcome of one admission attempt.
#[derive(Debug)]
pub enum AdmissionOutcome {
    /// Funds moved; grants were recorded for every key class
    Succeeded(TxReceipt),
    /// Request refused before dispatch; no state mutated
    Rejected(Rejection),
    /// The chain's gate wait expired; retry later, nothing consumed
    Busy,
    /// Dispatch or storage failure; no grant consumed
    Failed(String),
}

/// Why a request was refused.
#[derive(Debug)]
pub enum Rejection {
    /// Unknown chain or destination without the chain's prefix
    UnsupportedAddress(String),
    /// One or more key classes exhausted their window
    RateLimited,
}

/// Composes validation, multi-key admission, dispatch, and grant recording
/// into one operation per request.
///
/// All three key classes must pass before anything is dispatched, and no
/// grant is recorded until the transfer has actually succeeded, so a failed
/// or busy attempt never costs the requester a slot.
pub struct AdmissionPipeline {
    config: Arc<SpigotConfig>,
    checker: FrequencyChecker,
    dispatcher: Arc<TxDispatcher>,
}

impl AdmissionPipeline {
    /// Create a pipeline over the shared checker and dispatcher.
    pub fn new(
        config: Arc<SpigotConfig>,
        checker: FrequencyChecker,
        dispatcher: Arc<TxDispatcher>,
    ) -> Self {
        Self {
            config,
            checker,
            dispatcher,
        }
    }

    /// Run one request through the pipeline.
    #[instrument(
        skip(self, request),
        fields(
            request_id = %Uuid::new_v4(),
            chain = %request.chain,
            address = %request.address
        )
    )]
    pub async fn admit(&self, request: &TransferRequest) -> AdmissionOutcome {
        let profile = match self.config.chain(&request.chain) {
            Some(profile) => profile,
            None => {
                return AdmissionOutcome::Rejected(Rejection::UnsupportedAddress(format!(
                    "Chain [{}] is not supported.",
                    request.chain
                )))
            }
        };

        if !request.address.starts_with(&profile.prefix) {
            return AdmissionOutcome::Rejected(Rejection::UnsupportedAddress(format!(
                "Address [{}] is not supported.",
                request.address
            )));
        }

        let keys = [
            (GrantKey::ip(&request.chain, &request.ip), profile.limits.ip),
            (
                GrantKey::address(&request.chain, &request.address),
                profile.limits.address,
            ),
            (
                GrantKey::identity(&request.chain, &request.identity),
                profile.limits.identity,
            ),
        ];

        // No partial admission: every class must pass before anything is
        // dispatched or recorded.
        for (key, limit) in &keys {
            match self.checker.check(key, *limit) {
                Ok(true) => {}
                Ok(false) => {
                    info!(key = %key, limit, "Admission refused, window exhausted");
                    return AdmissionOutcome::Rejected(Rejection::RateLimited);
                }
                Err(e) => {
                    // Fail closed: an unreadable store never admits
                    error!(key = %key, error = %e, "Window store unavailable");
                    return AdmissionOutcome::Failed(e.to_string());
                }
            }
        }

        let receipt = match self.dispatcher.dispatch(&request.chain, &request.address).await {
            Ok(receipt) => receipt,
            Err(SpigotError::DispatcherBusy(chain)) => {
                warn!(chain = %chain, "Gate wait expired");
                return AdmissionOutcome::Busy;
            }
            Err(e) => {
                error!(error = %e, "Dispatch failed");
                return AdmissionOutcome::Failed(e.to_string());
            }
        };

        // Funds have moved; every class consumes exactly one slot. A failed
        // write under-counts rather than blocking the success, so it is
        // retried once and otherwise logged.
        for (key, _) in &keys {
            if let Err(e) = self.checker.record(key).await {
                warn!(key = %key, error = %e, "Grant record failed, retrying");
                if let Err(e) = self.checker.record(key).await {
                    error!(key = %key, error = %e, "Grant not recorded; window will under-count");
                }
            }
        }

        info!(tx_hash = %receipt.tx_hash, height = receipt.height, "Request granted");
        AdmissionOutcome::Succeeded(receipt)
    }
}
