use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use mail_sync_queue::config::Settings;
use mail_sync_queue::connectivity::{ConnectivityProbe, WatchConnectivity};
use mail_sync_queue::processor::QueueProcessor;
use mail_sync_queue::remote::WebDavEndpoint;
use mail_sync_queue::retry::create_retry_policy;
use mail_sync_queue::server::{create_app, AppState};
use mail_sync_queue::shutdown::GracefulShutdown;
use mail_sync_queue::sqlite::SqliteDatabase;
use mail_sync_queue::store::create_operation_store;
use mail_sync_queue::tasks::SyncWorker;
use mail_sync_queue::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings)?;
    tracing::info!("Configuration loaded");

    // Open the durable store
    let database = if settings.queue.backend == "memory" {
        None
    } else {
        Some(SqliteDatabase::connect(&settings.database).await?)
    };
    let store = create_operation_store(&settings.queue, database.as_ref()).await?;

    let cancel = CancellationToken::new();

    // Connectivity starts pessimistic; the probe flips it on first contact
    let connectivity = Arc::new(WatchConnectivity::new(false));
    let probe = ConnectivityProbe::new(
        &settings.connectivity,
        settings.remote.base_url.clone(),
        connectivity.clone(),
        cancel.clone(),
    )?;

    let endpoint = Arc::new(WebDavEndpoint::new(&settings.remote)?);
    let policy = create_retry_policy(&settings.retry);

    let processor = Arc::new(QueueProcessor::new(
        store.clone(),
        endpoint,
        connectivity.clone(),
        policy,
        cancel.clone(),
    ));

    let (worker, sync_handle) = SyncWorker::new(
        processor.clone(),
        connectivity.clone(),
        settings.sync.clone(),
        cancel.clone(),
    );

    let mut shutdown = GracefulShutdown::new(cancel.clone(), store, database);
    shutdown.track("connectivity_probe", tokio::spawn(probe.run()));
    shutdown.track("sync_worker", tokio::spawn(worker.run()));

    let state = AppState::new(settings.clone(), processor, connectivity, sync_handle);
    tracing::info!("Application state initialized");

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(cancel.clone()))
        .await?;

    let result = shutdown.execute("server stopped").await;
    if !result.success {
        tracing::warn!("Shutdown completed with background tasks still running");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
        _ = cancel.cancelled() => {}
    }

    cancel.cancel();
}
