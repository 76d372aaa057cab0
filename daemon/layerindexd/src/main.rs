use clap::Parser;
use layerindex_common::telemetry;
use layerindex_domain::image::store::{SnapshotError, SnapshotStore};
use layerindex_infra_fs::JsonSnapshotStore;
use layerindex_infra_registry::RegistryClient;
use layerindex_sync::{MetadataCache, Watcher};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod api;
mod settings;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = settings::Args::parse();
    let settings = settings::Settings::load(&args)?;
    telemetry::init_tracing("layerindexd", settings.log.level.as_deref())?;

    info!(registry = %settings.registry.url, "Starting layer index daemon");

    let store = Arc::new(JsonSnapshotStore::new(&settings.cache.snapshot_path));
    // Serve the last snapshot until the watcher's first crawl replaces it.
    let cache = Arc::new(match store.load().await {
        Ok(index) => MetadataCache::with_index(index),
        Err(e) if e.code() == SnapshotError::MISSING => MetadataCache::new(),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable snapshot");
            MetadataCache::new()
        }
    });

    let registry = Arc::new(RegistryClient::new(settings.registry_config()?)?);
    let watcher = Watcher::new(registry.clone(), store, cache.clone(), settings.watcher_config());
    let state = state::AppState::new(cache, watcher.subscribe());

    let cancel = CancellationToken::new();
    let watcher_task = tokio::spawn(watcher.run(cancel.clone()));

    let listener = tokio::net::TcpListener::bind(&settings.server.listen).await?;
    info!("Query API listening on {}", settings.server.listen);
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    watcher_task.await?;
    match Arc::try_unwrap(registry) {
        Ok(client) => client.close(),
        Err(_) => warn!("Registry client still referenced at shutdown"),
    }

    info!("Layer index daemon stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => {},
    }

    info!("Shutdown requested");
    cancel.cancel();
}
