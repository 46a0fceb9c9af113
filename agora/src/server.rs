use anyhow::{Context, Result};
use tracing::{error, info};

use agora_api::{create_router, AppState};
use agora_core::Config;
use agora_presence::Coordinator;

/// HTTP and WebSocket front of the coordinator
pub struct AgoraServer {
    config: Config,
    coordinator: Coordinator,
}

impl AgoraServer {
    #[must_use]
    pub const fn new(config: Config, coordinator: Coordinator) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    /// Bind the HTTP listener and serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<()> {
        let http_addr = self.config.http_address();
        let router = create_router(AppState::new(self.coordinator.clone()));

        let listener = tokio::net::TcpListener::bind(&http_addr)
            .await
            .with_context(|| format!("Failed to bind HTTP address {http_addr}"))?;

        info!("HTTP server listening on {}", http_addr);

        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("HTTP server error: {}", e);
            return Err(e.into());
        }

        info!(
            remaining_conferences = self.coordinator.directory().len(),
            "HTTP server shut down gracefully"
        );
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal");
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
