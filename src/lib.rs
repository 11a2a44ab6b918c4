pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod health; // Prediction service health probe
pub mod metrics;
pub mod models;
pub mod patients;
pub mod prediction;
pub mod reconciler; // Scan status reconciliation
pub mod snapshot;
pub mod submission;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("Cannot open database: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Cannot create prediction client: {0}")]
    Prediction(#[from] prediction::PredictionError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
    #[error("Cannot listen for shutdown signal: {0}")]
    Signal(std::io::Error),
}

/// Start the service and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::Config::from_env()?;
    let database = db::Database::open(&config.db_path)?;
    tracing::info!(path = %database.path().display(), "Database ready");

    let backend = prediction::PredictionClient::new(&config.prediction_url)?;
    tracing::info!(url = backend.base_url(), "Prediction service configured");

    let bind_addr = config.bind_addr;
    let core = Arc::new(core_state::CoreState::new(config, database, Arc::new(backend)));
    let server = api::start_server_on(core, bind_addr).await?;
    tracing::info!(addr = %server.addr(), "Listening");

    tokio::signal::ctrl_c().await.map_err(StartupError::Signal)?;
    tracing::info!("Shutdown requested");
    server.shutdown().await;
    Ok(())
}
