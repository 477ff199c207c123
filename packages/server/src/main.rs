use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use filehub_common::storage::filesystem::FilesystemBlobStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use filehub_server::config::AppConfig;
use filehub_server::database::init_db;
use filehub_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database)
        .await
        .context("Failed to initialise database")?;

    let blobs = FilesystemBlobStore::new(
        config.storage.blob_dir.clone(),
        config.storage.max_blob_size,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to open blob store at {}",
            config.storage.blob_dir.display()
        )
    })?;
    info!(blob_dir = %config.storage.blob_dir.display(), "Blob store ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let app = filehub_server::build_router(AppState::new(config, db, Arc::new(blobs)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
