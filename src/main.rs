use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use usuarios_core::{
    CoreConfig, UserStore, corrupt_data_policy_from_env_value, data_file_from_env_value,
};

/// Main entry point for the user record service
///
/// Opens the store once, serves the REST API, and flushes the store after a graceful shutdown
/// (Ctrl-C).
///
/// # Environment Variables
/// - `USUARIOS_REST_ADDR`: REST server address (default: "0.0.0.0:8080")
/// - `USUARIOS_DATA_FILE`: Path of the user file (default: "data/users.json")
/// - `USUARIOS_ON_CORRUPT_DATA`: `fail` or `start-empty` (default: "fail")
///
/// # Returns
/// * `Ok(())` - If the server starts, runs and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, startup, serving or the final flush fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("usuarios_run=info".parse()?)
                .add_directive("usuarios_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("USUARIOS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());

    let cfg = CoreConfig::new(
        data_file_from_env_value(std::env::var("USUARIOS_DATA_FILE").ok()),
        corrupt_data_policy_from_env_value(std::env::var("USUARIOS_ON_CORRUPT_DATA").ok())?,
    )?;
    let store = UserStore::open(&cfg)?;

    tracing::info!("++ Starting user REST API on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    api_rest::serve(listener, AppState::new(store), api_rest::shutdown_signal()).await?;

    tracing::info!("-- Stopped user REST API");
    Ok(())
}
