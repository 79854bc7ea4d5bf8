//! nsdrop entry point.

mod app;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting nsdrop");

    let cli = config::Cli::parse();
    let config = config::Config::load(&cli)?;
    tracing::info!(
        root = %config.root.display(),
        folders = %config.folders,
        host = %config.host_address(),
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("nsdrop shut down cleanly");
    Ok(())
}
