// HTTP server with graceful shutdown

use crate::error::HostError;
use crate::state::AppState;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Serve the management API until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), HostError> {
    let addr = state.settings.socket_addr()?;
    let app = crate::build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "Management API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    warn!("Management API shut down");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
