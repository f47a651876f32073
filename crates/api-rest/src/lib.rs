//! # API REST
//!
//! REST API for the user record service.
//!
//! Handles:
//! - HTTP endpoints with axum (`/health`, `/users`, `/users/{id}`)
//! - The `{ success, data, error, timestamp }` response envelope and error codes
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, CORS, request tracing)
//! - Server lifetime: graceful shutdown followed by a final store flush
//!
//! Uses `usuarios-core` for the store and validation; no business rules live here.

#![warn(rust_2018_idioms)]

pub mod envelope;
pub mod routes;

pub use envelope::{ApiError, ApiResponse};
pub use routes::{router, ApiDoc, AppState};

use std::future::Future;
use tokio::net::TcpListener;

/// Serves the REST API until `shutdown` resolves, then flushes the store to disk.
///
/// Both server binaries run through here so that every graceful stop ends with the file
/// matching memory.
///
/// # Errors
/// Returns an error if:
/// - the HTTP server fails while running,
/// - the store lock is poisoned, or
/// - the final flush cannot write the user file.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = state.store();

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    let store = store
        .lock()
        .map_err(|_| anyhow::anyhow!("user store lock is poisoned"))?;
    store.flush()?;

    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
