//! HTTP route handlers for the faucet surface.

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use super::verify::{HumanVerifier, IdentityProvider};
use crate::admission::{AdmissionOutcome, AdmissionPipeline, Rejection, TransferRequest};
use crate::config::SpigotConfig;
use crate::dispatch::TxDispatcher;

/// Shared state behind every route.
pub struct AppState {
    pub config: Arc<SpigotConfig>,
    pub pipeline: AdmissionPipeline,
    pub dispatcher: Arc<TxDispatcher>,
    pub verifier: Arc<dyn HumanVerifier>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Body of a transfer request.
#[derive(Debug, Deserialize)]
pub struct SendBody {
    /// Proof-of-human token
    #[serde(default)]
    pub recaptcha: String,
    /// External identity bearer token
    #[serde(default)]
    pub identity_token: String,
}

/// `POST /send/:chain/:address`
pub async fn send(
    State(state): State<Arc<AppState>>,
    Path((chain, address)): Path<(String, String)>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<SendBody>,
) -> (StatusCode, Json<Value>) {
    let ip = client_ip(&headers).unwrap_or_else(|| peer.ip().to_string());

    if !state.verifier.verify(&body.recaptcha).await {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "result": "Captcha is not valid" })),
        );
    }

    let identity = match state.identity.resolve(&body.identity_token).await {
        Some(identity) => identity,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "result": "You are not a member of the server" })),
            )
        }
    };

    let request = TransferRequest {
        chain,
        address,
        ip,
        identity: identity.id,
    };
    outcome_response(state.pipeline.admit(&request).await)
}

/// Map a terminal admission outcome onto the HTTP surface.
fn outcome_response(outcome: AdmissionOutcome) -> (StatusCode, Json<Value>) {
    match outcome {
        AdmissionOutcome::Succeeded(receipt) => (
            StatusCode::OK,
            Json(json!({
                "result": {
                    "code": receipt.code,
                    "tx_hash": receipt.tx_hash,
                    "height": receipt.height,
                }
            })),
        ),
        AdmissionOutcome::Rejected(Rejection::UnsupportedAddress(message)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "result": message })))
        }
        AdmissionOutcome::Rejected(Rejection::RateLimited) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "result": "You requested too often" })),
        ),
        AdmissionOutcome::Busy => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "result": "Faucet is busy, Please try again later." })),
        ),
        AdmissionOutcome::Failed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "result": "Failed, Please contact to admin." })),
        ),
    }
}

/// `GET /balance/:chain`
pub async fn balance(
    State(state): State<Arc<AppState>>,
    Path(chain): Path<String>,
) -> Json<Value> {
    match state.dispatcher.balance(&chain).await {
        Ok(coin) => Json(json!(coin)),
        Err(e) => {
            warn!(chain = %chain, error = %e, "Balance query failed");
            Json(json!({}))
        }
    }
}

/// `GET /config.json`
pub async fn project_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut sample = serde_json::Map::new();
    for profile in &state.config.chains {
        if let Some(address) = state.dispatcher.sender_address(&profile.name) {
            sample.insert(profile.name.clone(), Value::String(address));
        }
    }

    let chains: Vec<&str> = state.config.chains.iter().map(|c| c.name.as_str()).collect();
    Json(json!({
        "name": state.config.project.name,
        "chains": chains,
        "sample": sample,
    }))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Client IP as forwarded by the fronting proxy, if any.
///
/// Header precedence follows the deployment's proxy chain; the first entry
/// of a comma-separated `x-forwarded-for` list is the original client.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    for name in ["cf-connecting-ip", "x-real-ip", "x-forwarded-for"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or(value).trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxReceipt;

    #[test]
    fn test_client_ip_prefers_cloudflare_header() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", "203.0.113.7".parse().unwrap());
        headers.insert("x-forwarded-for", "198.51.100.2".parse().unwrap());

        assert_eq!(client_ip(&headers).unwrap(), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 10.0.0.1, 10.0.0.2".parse().unwrap(),
        );

        assert_eq!(client_ip(&headers).unwrap(), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_missing_headers() {
        assert!(client_ip(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_outcome_status_codes() {
        let receipt = TxReceipt {
            code: 0,
            tx_hash: "HASH".to_string(),
            height: 7,
        };

        let (status, body) = outcome_response(AdmissionOutcome::Succeeded(receipt));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.0["result"]["tx_hash"], "HASH");

        let (status, _) = outcome_response(AdmissionOutcome::Rejected(
            Rejection::UnsupportedAddress("Address [x] is not supported.".to_string()),
        ));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = outcome_response(AdmissionOutcome::Rejected(Rejection::RateLimited));
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) = outcome_response(AdmissionOutcome::Busy);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = outcome_response(AdmissionOutcome::Failed("boom".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
