//! Package discovery and manifest building.
//!
//! Walks the configured scan roots below a base root, picks up console
//! package files and renders the download lines that get announced to
//! the console.
//!
//! The manifest is built fresh for every announce request and never
//! cached. Download requests are mapped back to disk by decoding the
//! announced path (see [`resolve_download_path`]), so no table of
//! previously announced files is kept anywhere.

mod builder;
mod error;
mod path;
mod types;

pub use builder::{build_manifest, is_package_file, parse_scan_roots};
pub use error::ManifestError;
pub use path::{decode_announced_path, encode_announced_path, resolve_download_path};
pub use types::{Manifest, ManifestEntry, ScanConfig};

/// File extensions recognized as installable packages (case-sensitive).
pub const PACKAGE_EXTENSIONS: [&str; 3] = ["nsp", "nsz", "xci"];

/// URL path prefix under which packages are served.
pub const FILES_ROUTE: &str = "/files/";
