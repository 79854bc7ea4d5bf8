//! Package list push to the console installer.
//!
//! Dials the console on a fixed TCP port, writes the manifest as a
//! length-prefixed list of download URLs and waits (bounded) for the
//! console to start consuming it before the connection is released.
//!
//! # Wire format
//!
//! See [`wire`] module for the byte layout.

pub mod announcer;
pub mod error;
pub mod wire;

pub use announcer::{AckOutcome, AnnounceReport, Announcer};
pub use error::AnnounceError;

use std::time::Duration;

/// TCP port the console installer listens on for package lists.
pub const ANNOUNCE_PORT: u16 = 2000;

/// Timeout for the TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the acknowledgement wait after the list is written.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on a single acknowledgement read attempt.
pub const ACK_READ_SLICE: Duration = Duration::from_millis(250);

/// Pause between acknowledgement read attempts that yielded nothing.
pub const ACK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Announcer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceConfig {
    /// Console port to dial.
    pub port: u16,
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    pub ack_read_slice: Duration,
    pub ack_poll_interval: Duration,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            port: ANNOUNCE_PORT,
            connect_timeout: CONNECT_TIMEOUT,
            ack_timeout: ACK_TIMEOUT,
            ack_read_slice: ACK_READ_SLICE,
            ack_poll_interval: ACK_POLL_INTERVAL,
        }
    }
}
