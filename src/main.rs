use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use labelq::config::Config;
use labelq::db;
use labelq::printer::network::NetworkPrinterDriver;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| format!("Failed to load configuration: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting labelq");

    let pool = db::connect(&config.database_url)
        .await
        .map_err(|e| format!("Failed to open print queue database: {e}"))?;
    db::migrate(&pool)
        .await
        .map_err(|e| format!("Failed to run migrations: {e}"))?;
    tracing::info!("Migrations applied");

    let driver = NetworkPrinterDriver::new(config.printer.devices.clone(), config.printer.timeout);
    if config.printer.devices.is_empty() {
        tracing::warn!("No printers configured (LABELQ_PRINTERS), every request will be queued");
    }

    let addr = SocketAddr::new(config.host, config.port);
    let shutdown_timeout = config.shutdown_timeout;
    let state = labelq::build_state(pool, config, Arc::new(driver));

    // Nothing can be in flight yet, so anything still PROCESSING was interrupted.
    state.dispatcher.recover_interrupted().await?;
    let dispatcher = state.dispatcher.clone().spawn();

    let app = labelq::build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !dispatcher.stop(shutdown_timeout).await {
        tracing::warn!("Pending print requests will resume on next start");
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
