//! Error types for the announcer.

/// Errors produced while announcing a manifest.
#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error("destination address is empty")]
    EmptyDestination,

    #[error("cannot connect to {destination}: {source}")]
    Connect {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    #[error("transmission failed: {0}")]
    Transmission(#[source] std::io::Error),

    #[error("manifest of {0} bytes does not fit the length header")]
    PayloadTooLarge(u64),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("cancelled")]
    Cancelled,
}

impl AnnounceError {
    /// Returns `true` if no connection to the console was established.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout(_))
    }
}
