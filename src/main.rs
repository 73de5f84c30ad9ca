use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use spigot::admission::AdmissionPipeline;
use spigot::chain::{ChainSigner, RpcChainClient};
use spigot::config::SpigotConfig;
use spigot::dispatch::TxDispatcher;
use spigot::http::{build_identity_provider, build_verifier, AppState, HttpServer};
use spigot::ratelimit::{FrequencyChecker, WindowStore};

/// Shared-custody token faucet.
#[derive(Parser, Debug)]
#[command(name = "spigot", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "spigot.yaml")]
    config: String,

    /// Override the configured HTTP listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Spigot Faucet Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = Arc::new(SpigotConfig::from_file(&args.config)?);
    let addr = args.listen.unwrap_or(config.server.http_addr);
    info!(addr = %addr, chains = config.chains.len(), "Configuration loaded");

    // Durable grant window behind the frequency checker
    let store = WindowStore::open(&config.store.path)?;
    let checker = FrequencyChecker::new(store);
    info!(path = %config.store.path, "Window store opened");

    // One signing lane per configured chain
    let dispatcher = Arc::new(TxDispatcher::new());
    for profile in &config.chains {
        let signer = ChainSigner::derive(&profile.signer_secret, &profile.prefix)?;
        info!(chain = %profile.name, sender = %signer.address(), "Chain lane registered");
        let client = Arc::new(RpcChainClient::new(&profile.rpc_endpoint));
        dispatcher.register(profile, signer, client);
    }

    let pipeline = AdmissionPipeline::new(config.clone(), checker, dispatcher.clone());
    let verifier = build_verifier(&config.verify);
    let identity = build_identity_provider(&config.verify);

    let state = Arc::new(AppState {
        config,
        pipeline,
        dispatcher,
        verifier,
        identity,
    });

    // Run the server with graceful shutdown on Ctrl+C
    HttpServer::new(addr, state)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Spigot Faucet Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
