use std::panic;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use collab_sync::config::Config;
use collab_sync::db::{dbsnap::DbSnapshots, memory::MemorySnapshots, SnapshotBackend};
use collab_sync::{app, AppState};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "collab_sync=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    // Open the snapshot store; run on the in-memory fallback when no
    // database is configured or reachable.
    let backend = match &config.db_url {
        Some(db_url) => match DbSnapshots::new(db_url).await {
            Ok(db) => {
                info!("Snapshot store initialized");
                SnapshotBackend::Postgres(db)
            }
            Err(e) => {
                error!("Failed to initialize snapshot store: {}", e);
                warn!("Falling back to in-memory snapshots - state will not survive restarts");
                SnapshotBackend::Memory(Arc::new(MemorySnapshots::new()))
            }
        },
        None => {
            warn!("No database URL configured - using in-memory snapshots");
            SnapshotBackend::Memory(Arc::new(MemorySnapshots::new()))
        }
    };

    let state = Arc::new(AppState::new(config.clone(), backend));
    let app_routes = app(state.clone());

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("Server running on http://{}", config.server_address());
    info!("WebSocket available at ws://{}/ws", config.server_address());
    info!(
        "Swagger UI available at http://{}/swagger",
        config.server_address()
    );

    axum::serve(listener, app_routes)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed to start");

    // Flush pending debounced snapshots before exiting. Anything that
    // arrived inside the final debounce window would otherwise be lost.
    info!("Shutting down, flushing pending snapshots...");
    state.scheduler.flush_all().await;
    info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
