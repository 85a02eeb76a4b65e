//! Attr Cache - attribute and player caching server
//!
//! Opens the persistent store, fronts it with the caches and serves the
//! admin API until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attr_cache::api::{create_router, AppState};
use attr_cache::store::FileStore;
use attr_cache::{spawn_maintenance_task, Config, Engine};

/// Main entry point for the attribute cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the persistent store and build the engine
/// 4. Start the background maintenance task
/// 5. Serve the admin API on the configured port
/// 6. On SIGINT/SIGTERM, flush players, sync and close the store
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attr_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting attribute cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_cache_size={}, max_record_len={}, spool_partitions={}, port={}",
        config.max_cache_size, config.max_record_len, config.spool_partitions, config.server_port
    );

    let store = FileStore::open(
        &config.store_log_path,
        &config.store_snapshot_path,
        config.store_cache_pages,
    )
    .with_context(|| {
        format!(
            "opening store at {} / {}",
            config.store_log_path.display(),
            config.store_snapshot_path.display()
        )
    })?;

    let state = AppState::new(Engine::open(Box::new(store), &config));

    let maintenance = spawn_maintenance_task(
        state.engine.clone(),
        Duration::from_millis(config.tick_interval_ms),
        Duration::from_secs(config.player_trim_interval),
    );
    info!("Background maintenance task started");

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving admin API")?;

    maintenance.abort();
    // Resolves once the task is dropped along with its engine handle
    let _ = maintenance.await;
    warn!("Maintenance task stopped");

    let engine = Arc::try_unwrap(state.engine)
        .map_err(|_| anyhow!("engine still shared at shutdown"))?
        .into_inner();
    engine.shutdown().context("closing store")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
