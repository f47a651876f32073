//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server without the workspace launcher.
//!
//! ## Intended use
//! Useful for development and debugging. Serves the same router as the workspace's main
//! `usuarios-run` binary and shares its teardown: Ctrl-C stops the server, then the store is
//! flushed.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usuarios_core::{
    corrupt_data_policy_from_env_value, data_file_from_env_value, CoreConfig, UserStore,
};

/// Main entry point for the standalone REST API server
///
/// # Environment Variables
/// - `USUARIOS_REST_ADDR`: Server address (default: "0.0.0.0:8080")
/// - `USUARIOS_DATA_FILE`: Path of the user file (default: "data/users.json")
/// - `USUARIOS_ON_CORRUPT_DATA`: `fail` or `start-empty` (default: "fail")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the store cannot be opened,
/// - the server address cannot be bound,
/// - the HTTP server fails while running, or
/// - the final flush fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("USUARIOS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());

    let cfg = CoreConfig::new(
        data_file_from_env_value(std::env::var("USUARIOS_DATA_FILE").ok()),
        corrupt_data_policy_from_env_value(std::env::var("USUARIOS_ON_CORRUPT_DATA").ok())?,
    )?;
    let store = UserStore::open(&cfg)?;

    tracing::info!("-- Starting user REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    api_rest::serve(
        listener,
        api_rest::AppState::new(store),
        api_rest::shutdown_signal(),
    )
    .await?;

    tracing::info!("-- Stopped user REST API");
    Ok(())
}
