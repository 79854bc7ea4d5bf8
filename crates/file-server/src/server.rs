//! File server accept loop.
//!
//! Listens on a TCP port and handles one HTTP request per connection,
//! each on its own task.

use std::net::SocketAddr;
use std::sync::Arc;

use nsdrop_announce::{AnnounceConfig, Announcer};
use nsdrop_manifest::ScanConfig;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::http::{self, Method, Response, Status};
use crate::{REQUEST_HEAD_TIMEOUT, ServerError, WRITE_BUFFER_SIZE, routes};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind (port 0 = OS-assigned).
    pub listen: SocketAddr,
    pub scan: Arc<ScanConfig>,
    pub announce: AnnounceConfig,
}

/// The HTTP front end.
pub struct FileServer {
    config: ServerConfig,
    announcer: Announcer,
}

impl FileServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let announcer = Announcer::new(config.announce.clone());
        Arc::new(Self { config, announcer })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    /// Binds the configured address.
    pub async fn listen(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(self.config.listen).await?;
        tracing::info!("file server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accepts connections on `listener` until `cancel` fires.
    pub async fn serve(
        self: &Arc<Self>,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("file server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr, cancel).await {
                                    tracing::warn!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Reads one request, routes it and writes the response.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<(), ServerError> {
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, writer);

        let read = tokio::time::timeout(REQUEST_HEAD_TIMEOUT, http::read_request(&mut reader));
        let request = match read.await {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(e)) => {
                Response::status(Status::from(&e))
                    .write_to(&mut writer, false)
                    .await?;
                return Err(e);
            }
            Err(_) => {
                Response::status(Status::RequestTimeout)
                    .write_to(&mut writer, false)
                    .await?;
                return Err(ServerError::Timeout);
            }
        };

        tracing::info!(
            %peer_addr,
            method = %request.method,
            uri = %request.target,
            range = request.header("range").unwrap_or("-"),
            "request"
        );

        let response = routes::dispatch(self, &request, &cancel).await;
        let status = response.status;
        response
            .write_to(&mut writer, request.method == Method::Head)
            .await?;
        writer.shutdown().await?;

        tracing::debug!(%peer_addr, status = status.code(), "response sent");
        Ok(())
    }
}
