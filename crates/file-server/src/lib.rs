//! HTTP front end for nsdrop.
//!
//! Serves the operator page, triggers a scan + announce when the page is
//! submitted, and serves package bytes under `/files/` to the console.
//! One request per connection; the console opens a new connection for
//! every range it fetches.

mod http;
mod range;
mod routes;
mod server;

pub use server::{FileServer, ServerConfig};

use std::time::Duration;

/// Maximum size of a request line plus headers.
pub const MAX_REQUEST_HEAD: usize = 16 * 1024;

/// Maximum size of a form body.
pub const MAX_FORM_BODY: usize = 4 * 1024;

/// Timeout for receiving the request head.
///
/// There is no write timeout: consoles download slowly.
pub const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Response write buffer size (256 KB).
pub const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Form field carrying the console address.
pub const DESTINATION_FIELD: &str = "switch";

/// Errors produced by the file server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("request head too large")]
    HeadTooLarge,

    #[error("request body too large")]
    BodyTooLarge,

    #[error("request timed out")]
    Timeout,
}
