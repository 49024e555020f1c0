//! DirChat server binary.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dirchat::config::Config;
use dirchat::server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dirchat=info")),
        )
        .init();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.scratch_dir)?;

    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "DirChat server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
