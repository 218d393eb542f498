use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use parley_backend::directory::{
    http_client, HttpCredentialVerifier, HttpOrderDirectory, HttpProfileDirectory,
};
use parley_backend::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("starting Parley backend");

    let config = parley_config::load().context("failed to load configuration")?;

    let pool = parley_database::initialize_database(&config.database)
        .await
        .context("failed to initialise database")?;

    let client = http_client(&config.services).context("failed to build http client")?;
    let verifier = Arc::new(HttpCredentialVerifier::new(
        client.clone(),
        &config.services.auth_service_url,
    ));
    let orders = Arc::new(HttpOrderDirectory::new(
        client.clone(),
        &config.services.order_service_url,
    ));
    let profiles = Arc::new(HttpProfileDirectory::new(
        client,
        &config.services.profile_service_url,
    ));

    let state = AppState::new(pool, &config, verifier, orders, profiles);
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "websocket server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    async {
        if let Err(error) = signal::ctrl_c().await {
            error!(?error, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    }
}
