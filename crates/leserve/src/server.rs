//! Server instance management

use std::net::SocketAddr;

use tokio::signal;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers::{app, AppState};

/// LeServe HTTP server
///
/// Owns the handler state and runs axum until Ctrl+C or SIGTERM, letting
/// in-flight questions finish.
pub struct LeServeServer {
    config: ServerConfig,
    state: AppState,
}

impl LeServeServer {
    /// Create a server; the config is validated here
    pub fn new(state: AppState) -> Result<Self, ApiError> {
        let config = (*state.config).clone();
        if let Err(e) = config.validate() {
            return Err(ApiError::internal(format!("Invalid config: {}", e)));
        }
        Ok(Self { config, state })
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, ApiError> {
        self.config
            .socket_addr()
            .map_err(|e| ApiError::internal(format!("Failed to parse address: {}", e)))
    }

    /// Serve until a shutdown signal arrives
    pub async fn start(&self) -> Result<(), ApiError> {
        let addr = self.socket_addr()?;
        let router = app(self.state.clone());

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind to {}: {:?}", addr, e);
            ApiError::internal(format!("Failed to bind to {}: {}", addr, e))
        })?;

        info!("Server listening on: {}", self.server_url());

        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown())
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get server URL
    #[must_use]
    pub fn server_url(&self) -> String {
        self.config.server_url()
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix;
        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received TERM signal");
            }
            Err(e) => {
                error!("Failed to install TERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
