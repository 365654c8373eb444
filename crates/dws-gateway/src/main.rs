//! Divisible workspaces node daemon.
//!
//! Reads the pairing from `DWS_CONFIG`, learns the local identity from
//! `DWS_DEVICE_IDENTITY` or `DWS_IDENTITY_FILE`, keeps its state under
//! `DATA_DIR` and serves peers on `LISTEN_ADDR` (or the configured address).
//! Any configuration problem stops the process with a non-zero exit code.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dws_gateway::{create_router, Daemon, PairingConfig, Settings, StartupError};
use dws_store::RocksStore;
use dws_transport::HttpPeerClient;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dws=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Divisible workspace node stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    tracing::info!("Starting divisible workspace node");

    let settings = Settings::from_env();
    let pairing = PairingConfig::load(&settings.config_path)?;
    let identity = settings.identity_provider()?.identity()?;
    let listen_addr = settings
        .listen_addr
        .clone()
        .unwrap_or_else(|| pairing.gateway.listen_addr.clone());

    tracing::info!(
        config = %settings.config_path.display(),
        data_dir = %settings.data_dir.display(),
        listen_addr = %listen_addr,
        identity = %identity,
        devices = pairing.devices.len(),
        "Configuration loaded"
    );

    tracing::info!(path = %settings.data_dir.display(), "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&settings.data_dir)?);
    let client = Arc::new(HttpPeerClient::new(
        pairing.credentials.clone(),
        pairing.transport.clone(),
    )?);

    let daemon = Daemon::assemble(&pairing, &identity, store, client).await?;
    let runner = daemon.spawn();

    let app = create_router(daemon.state.clone());
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down node");
    if let Err(err) = daemon.node().shutdown() {
        tracing::warn!(error = %err, "Node already stopped");
    }
    if let Err(err) = runner.await {
        tracing::warn!(error = %err, "Node task ended abnormally");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Unable to listen for shutdown signal");
    }
}
