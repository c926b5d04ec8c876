use anyhow::{Context, Result};
use caligula_backend::config::BackendConfig;
use caligula_backend::runtime::BackendRuntime;
use caligula_backend::server::serve_backend;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,caligula_backend=debug")),
        )
        .init();

    match dotenv {
        Ok(path) => tracing::info!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!("Failed to load .env: {}", e),
    }

    let config = BackendConfig::load();
    let runtime = BackendRuntime::bootstrap(config).context("failed to bootstrap backend runtime")?;

    tracing::info!(
        "Starting Caligula backend (persona '{}'; set CALIGULA_BIND or PORT to change the listener)",
        runtime.resolver.persona_id()
    );

    let server_rt = tokio::runtime::Runtime::new().context("failed to start server runtime")?;
    server_rt.block_on(serve_backend(runtime))
}
