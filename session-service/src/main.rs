use std::net::SocketAddr;
use std::sync::Arc;

use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use session_service::{
    build_router,
    clock::{Clock, SystemClock},
    config::Settings,
    services::{MongoSessionStore, PgCredentialStore},
    AppState,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let settings = Settings::load()?;

    init_tracing(
        &settings.service_name,
        &settings.logging.level,
        settings.environment,
        settings.logging.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %settings.service_name,
        version = env!("CARGO_PKG_VERSION"),
        environment = ?settings.environment,
        "Starting session service"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let session_store = MongoSessionStore::connect(
        settings.mongodb.uri.expose_secret(),
        &settings.mongodb.database,
        clock.clone(),
    )
    .await?;
    session_store.initialize_indexes().await?;

    let credentials = Arc::new(
        PgCredentialStore::connect(
            settings.postgres.url.expose_secret(),
            settings.postgres.pool_max,
        )
        .await?,
    );
    credentials.run_migrations().await?;
    tracing::info!("Storage initialized successfully");

    let addr: SocketAddr = settings
        .server
        .address()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid server address: {}", e)))?;

    let state = AppState::new(
        settings,
        Arc::new(session_store),
        credentials.clone(),
        credentials,
        clock,
    )?;
    let app = build_router(state);

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
