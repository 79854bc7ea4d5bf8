//! Announce client (server side, dials the console).
//!
//! Every announce dials a fresh connection, writes the whole package
//! list, then waits a bounded time for the console to react before the
//! connection is released.

use std::net::SocketAddr;

use nsdrop_manifest::Manifest;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::AnnounceConfig;
use crate::error::AnnounceError;
use crate::wire::{encode_manifest, write_payload};

/// Read buffer for the acknowledgement wait.
const ACK_BUFFER_SIZE: usize = 1024;

/// How the acknowledgement wait ended.
///
/// Only informational: the console normally just goes quiet or closes
/// once it has fetched the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The console sent this many bytes.
    Data(usize),
    /// The console closed the connection.
    Closed,
    /// Reading from the connection failed (reset, etc.).
    ReadError,
    /// Nothing happened before the wait expired.
    TimedOut,
}

/// Result of a completed announce.
#[derive(Debug, Clone)]
pub struct AnnounceReport {
    pub peer: SocketAddr,
    /// Bytes written, length header included.
    pub bytes_written: u64,
    pub ack: AckOutcome,
}

/// Pushes package lists to consoles.
#[derive(Debug, Clone, Default)]
pub struct Announcer {
    config: AnnounceConfig,
}

impl Announcer {
    pub fn new(config: AnnounceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnnounceConfig {
        &self.config
    }

    /// Sends `manifest` to `destination` (host or IP, without port).
    ///
    /// Succeeds once the payload is written and the acknowledgement wait
    /// is over, whatever the wait observed. The connection is closed on
    /// every path.
    pub async fn announce(
        &self,
        destination: &str,
        manifest: &Manifest,
        cancel: CancellationToken,
    ) -> Result<AnnounceReport, AnnounceError> {
        let host = destination.trim();
        if host.is_empty() {
            return Err(AnnounceError::EmptyDestination);
        }

        // Frame first: a payload that cannot be framed never reaches the wire.
        let payload = encode_manifest(manifest)?;

        let mut stream = self.connect(host, &cancel).await?;
        let peer = stream
            .peer_addr()
            .map_err(AnnounceError::Transmission)?;

        let result = self.deliver(&mut stream, &payload, &cancel).await;

        // Release regardless of outcome.
        if let Err(e) = stream.shutdown().await {
            debug!(%peer, "shutdown after announce failed: {e}");
        }
        drop(stream);

        let ack = result?;
        info!(
            %peer,
            entries = manifest.len(),
            bytes = payload.len(),
            ?ack,
            "package list announced"
        );

        Ok(AnnounceReport {
            peer,
            bytes_written: payload.len() as u64,
            ack,
        })
    }

    async fn connect(
        &self,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<TcpStream, AnnounceError> {
        let port = self.config.port;
        let destination = format!("{host}:{port}");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AnnounceError::Cancelled),
            result = tokio::time::timeout(
                self.config.connect_timeout,
                TcpStream::connect((host, port)),
            ) => {
                match result {
                    Ok(Ok(stream)) => {
                        info!(%destination, "connected to console");
                        Ok(stream)
                    }
                    Ok(Err(source)) => Err(AnnounceError::Connect { destination, source }),
                    Err(_) => Err(AnnounceError::ConnectTimeout(destination)),
                }
            }
        }
    }

    async fn deliver(
        &self,
        stream: &mut TcpStream,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<AckOutcome, AnnounceError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnnounceError::Cancelled),
            result = write_payload(stream, payload) => result?,
        }
        debug!(bytes = payload.len(), "package list written");

        self.await_ack(stream, cancel).await
    }

    /// Bounded wait for the console to send something or hang up.
    async fn await_ack(
        &self,
        stream: &mut TcpStream,
        cancel: &CancellationToken,
    ) -> Result<AckOutcome, AnnounceError> {
        // An ack_timeout too large to represent means no deadline.
        let deadline = Instant::now().checked_add(self.config.ack_timeout);
        let mut buf = [0u8; ACK_BUFFER_SIZE];

        loop {
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("acknowledgement wait expired");
                        return Ok(AckOutcome::TimedOut);
                    }
                    self.config.ack_read_slice.min(deadline - now)
                }
                None => self.config.ack_read_slice,
            };

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AnnounceError::Cancelled),
                result = tokio::time::timeout(slice, stream.read(&mut buf)) => result,
            };

            match attempt {
                Ok(Ok(0)) => return Ok(AckOutcome::Closed),
                Ok(Ok(n)) => return Ok(AckOutcome::Data(n)),
                Ok(Err(e)) => {
                    debug!("acknowledgement read failed: {e}");
                    return Ok(AckOutcome::ReadError);
                }
                Err(_) => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AnnounceError::Cancelled),
                _ = tokio::time::sleep(self.config.ack_poll_interval) => {}
            }
        }
    }
}
