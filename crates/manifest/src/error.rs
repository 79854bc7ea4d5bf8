//! Manifest error types.

use std::path::PathBuf;

/// Errors produced while building a manifest or resolving download paths.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// A configured scan root could not be opened for traversal.
    #[error("scan root unavailable: {}: {source}", root.display())]
    ScanRootUnavailable {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid request path: {0}")]
    InvalidRequestPath(String),
}
