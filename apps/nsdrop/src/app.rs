//! Application orchestrator: binds the file server and runs until Ctrl-C.

use std::sync::Arc;

use nsdrop_file_server::FileServer;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the server until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let server = FileServer::new(config.server_config());
    let listener = server.listen().await?;

    tracing::info!(
        addr = %listener.local_addr()?,
        root = %config.root.display(),
        folders = %config.folders,
        host = %config.host_address(),
        announce_port = config.announce_port,
        "serving packages"
    );

    let mut serve = {
        let server = Arc::clone(&server);
        let cancel = cancel.clone();
        tokio::spawn(async move { server.serve(listener, cancel).await })
    };

    tokio::select! {
        result = &mut serve => {
            // The accept loop only returns on its own if something broke.
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    cancel.cancel();
    serve.await??;
    Ok(())
}
