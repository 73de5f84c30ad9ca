//! Human and identity verification collaborators.
//!
//! Both checks sit in front of the admission pipeline and are specified
//! only at their interface boundary: the pipeline sees a yes/no and an
//! identity id, never the upstream providers' wire formats.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::VerifyConfig;

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
const DISCORD_API_URL: &str = "https://discord.com/api";
const MIN_RECAPTCHA_SCORE: f64 = 0.8;

/// Checks a proof-of-human token.
#[async_trait]
pub trait HumanVerifier: Send + Sync {
    /// Returns true iff the token proves a human requester. Upstream
    /// failures count as unverified.
    async fn verify(&self, token: &str) -> bool;
}

/// Resolves a bearer token to a stable external identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the requester's identity, or `None` when the token is
    /// invalid or the requester fails a membership requirement.
    async fn resolve(&self, token: &str) -> Option<Identity>;
}

/// A resolved external identity.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// reCAPTCHA v3 verifier.
pub struct RecaptchaVerifier {
    secret: String,
    action: String,
    http: reqwest::Client,
}

impl RecaptchaVerifier {
    pub fn new(secret: &str, action: &str) -> Self {
        Self {
            secret: secret.to_string(),
            action: action.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecaptchaResponse {
    success: bool,
    #[serde(default)]
    action: String,
    #[serde(default)]
    score: f64,
}

#[async_trait]
impl HumanVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        let result = self
            .http
            .post(RECAPTCHA_VERIFY_URL)
            .query(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await;

        let response = match result {
            Ok(response) => response.json::<RecaptchaResponse>().await,
            Err(e) => {
                warn!(error = %e, "Captcha verification request failed");
                return false;
            }
        };

        match response {
            Ok(data) => {
                data.success && data.action == self.action && data.score > MIN_RECAPTCHA_SCORE
            }
            Err(e) => {
                warn!(error = %e, "Captcha verification response unreadable");
                false
            }
        }
    }
}

/// Verifier used when no captcha secret is configured (development mode).
pub struct PermissiveVerifier;

#[async_trait]
impl HumanVerifier for PermissiveVerifier {
    async fn verify(&self, _token: &str) -> bool {
        true
    }
}

/// Discord-backed identity provider with optional guild membership check.
pub struct DiscordIdentityProvider {
    guild: Option<String>,
    http: reqwest::Client,
}

impl DiscordIdentityProvider {
    pub fn new(guild: Option<String>) -> Self {
        Self {
            guild,
            http: reqwest::Client::new(),
        }
    }

    async fn belongs_to_guild(&self, token: &str, guild: &str) -> bool {
        #[derive(Deserialize)]
        struct Guild {
            id: String,
        }

        let result = self
            .http
            .get(format!("{}/users/@me/guilds", DISCORD_API_URL))
            .bearer_auth(token)
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<Vec<Guild>>().await {
                Ok(guilds) => guilds.iter().any(|g| g.id == guild),
                Err(_) => false,
            },
            Err(e) => {
                warn!(error = %e, "Guild membership lookup failed");
                false
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for DiscordIdentityProvider {
    async fn resolve(&self, token: &str) -> Option<Identity> {
        if token.is_empty() {
            return None;
        }

        let response = self
            .http
            .get(format!("{}/users/@me", DISCORD_API_URL))
            .bearer_auth(token)
            .send()
            .await
            .ok()?;
        let identity = response.json::<Identity>().await.ok()?;

        if let Some(guild) = &self.guild {
            if !self.belongs_to_guild(token, guild).await {
                debug!(user = %identity.id, "Requester is not a guild member");
                return None;
            }
        }

        Some(identity)
    }
}

/// Provider used when no OAuth backend is configured: the presented token
/// itself is the identity id.
pub struct TokenIdentityProvider;

#[async_trait]
impl IdentityProvider for TokenIdentityProvider {
    async fn resolve(&self, token: &str) -> Option<Identity> {
        let id = if token.is_empty() { "anonymous" } else { token };
        Some(Identity {
            id: id.to_string(),
            username: String::new(),
        })
    }
}

/// Build the verifier the configuration calls for.
pub fn build_verifier(config: &VerifyConfig) -> Arc<dyn HumanVerifier> {
    match &config.recaptcha_secret {
        Some(secret) => Arc::new(RecaptchaVerifier::new(secret, &config.recaptcha_action)),
        None => {
            warn!("No captcha secret configured, admitting all proofs");
            Arc::new(PermissiveVerifier)
        }
    }
}

/// Build the identity provider the configuration calls for.
pub fn build_identity_provider(config: &VerifyConfig) -> Arc<dyn IdentityProvider> {
    match &config.discord_guild {
        Some(guild) => Arc::new(DiscordIdentityProvider::new(Some(guild.clone()))),
        None => Arc::new(TokenIdentityProvider),
    }
}
