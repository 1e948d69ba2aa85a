//! `rota-server` binary: configuration from the environment, tracing to
//! stderr, then the HTTP API in the foreground.

use rota::config::{Config, StorageConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    match &config.storage {
        StorageConfig::LocalFile { path } => {
            tracing::info!(path = %path.display(), "using local file storage");
        }
        StorageConfig::Gcs { bucket, object, .. } => {
            tracing::info!(bucket = %bucket, object = %object, "using GCS storage");
        }
    }

    let store = rota::store::from_config(&config.storage);
    rota::server::run(&config, store).await.map_err(|e| {
        tracing::error!(error = %e, "rota-server exited with error");
        anyhow::anyhow!("rota-server failed: {e}")
    })
}
