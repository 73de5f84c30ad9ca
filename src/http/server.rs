//! HTTP server wrapper for the faucet surface.

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{self, AppState};
use crate::error::Result;

/// HTTP server for the faucet routes.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared application state
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Build the route tree over the shared state.
    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/send/:chain/:address", post(handlers::send))
            .route("/balance/:chain", get(handlers::balance))
            .route("/config.json", get(handlers::project_config))
            .route("/health", get(handlers::health))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Starting HTTP server for faucet surface");

        axum::serve(
            listener,
            Self::router(self.state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(
            addr = %self.addr,
            "Starting HTTP server for faucet surface with graceful shutdown"
        );

        axum::serve(
            listener,
            Self::router(self.state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await?;
        Ok(())
    }
}
