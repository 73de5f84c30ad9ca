//! Error types for the Spigot service.

use thiserror::Error;

/// Main error type for faucet operations.
#[derive(Error, Debug)]
pub enum SpigotError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported chain or malformed destination address
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The per-chain dispatch gate could not be acquired within its wait bound
    #[error("Dispatcher busy for chain [{0}]")]
    DispatcherBusy(String),

    /// Broadcast, network, or chain-level rejection; the cause is opaque
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Window store errors
    #[error("Store error: {0}")]
    Store(#[from] sled::Error),

    /// Grant record (de)serialization errors
    #[error("Record serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Outbound HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for faucet operations.
pub type Result<T> = std::result::Result<T, SpigotError>;
