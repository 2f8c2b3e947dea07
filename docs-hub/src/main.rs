use anyhow::Result;
use axum::{routing::get, serve, Router};
use clap::Parser;
use docs_hub::{
    api,
    config::{load_config, BackendKind, Cli},
};
use docs_hub_core::persistence::{FileBackend, MemoryBackend, Persistence};
use docs_hub_core::TreeStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(Cli::parse())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log)?)
        .init();

    let backend: Arc<dyn Persistence> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::File => {
            let files = FileBackend::new(&config.data_dir)?;
            info!("Using file backend at {}", files.data_dir().display());
            Arc::new(files)
        }
    };
    let store = Arc::new(TreeStore::new(backend).with_repair_on_read(config.repair_on_read));

    let app = Router::new()
        .merge(api::router(store))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(config.addr).await?;
    info!("Listening on {}", config.addr);
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
