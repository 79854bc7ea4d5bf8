//! Recursive package scan.
//!
//! Each scan root is walked in configured order; within a directory,
//! entries are visited by file name so repeated scans of an unchanged
//! tree produce the same manifest.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::PACKAGE_EXTENSIONS;
use crate::error::ManifestError;
use crate::path::encode_announced_path;
use crate::types::{Manifest, ManifestEntry, ScanConfig};

/// Scans every configured root and returns the package manifest.
///
/// A root that cannot be opened fails the whole build, even when other
/// roots are fine. Errors on individual entries below a root (permission
/// denied, vanished files, symlink loops) only skip that entry.
pub fn build_manifest(config: &ScanConfig) -> Result<Manifest, ManifestError> {
    let mut manifest = Manifest::default();

    for root in &config.scan_roots {
        let root_path = config.base_root.join(root);
        let before = manifest.len();
        scan_root(config, &root_path, &mut manifest)?;
        debug!(
            root = %root_path.display(),
            found = manifest.len() - before,
            "scan root walked"
        );
    }

    info!(
        entries = manifest.len(),
        total_length = manifest.total_length(),
        "manifest built"
    );
    Ok(manifest)
}

/// Returns `true` if the file name carries one of the package extensions.
///
/// The extension is whatever follows the last `.` of the file name, so a
/// bare `.nsp` counts as a package too.
pub fn is_package_file(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    name.to_string_lossy()
        .rsplit_once('.')
        .is_some_and(|(_, ext)| PACKAGE_EXTENSIONS.contains(&ext))
}

/// Splits the comma-separated folder list, dropping blank items.
pub fn parse_scan_roots(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn scan_root(
    config: &ScanConfig,
    root: &Path,
    manifest: &mut Manifest,
) -> Result<(), ManifestError> {
    let inside_base = root
        .strip_prefix(&config.base_root)
        .is_ok_and(|rest| rest.components().all(|c| matches!(c, Component::Normal(_))));
    if !inside_base {
        return Err(unavailable(
            root,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "scan root is outside the base root",
            ),
        ));
    }

    // Probe the root itself; everything below it is best effort.
    std::fs::read_dir(root).map_err(|e| unavailable(root, e))?;

    let walker = WalkDir::new(root).follow_links(true).sort_by_file_name();
    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_package_file(entry.path()) {
            continue;
        }

        if let Some(entry) = manifest_entry(config, entry.into_path()) {
            manifest.push(entry);
        }
    }

    Ok(())
}

fn manifest_entry(config: &ScanConfig, absolute_path: PathBuf) -> Option<ManifestEntry> {
    let relative = absolute_path.strip_prefix(&config.base_root).ok()?;

    // A name that is not UTF-8 cannot survive the URL round trip.
    let Some(relative) = relative.to_str() else {
        warn!(path = %absolute_path.display(), "skipping package with non UTF-8 path");
        return None;
    };

    let relative_path = relative.replace('\\', "/");
    let announced_path = encode_announced_path(&relative_path);
    let line = config.download_line(&announced_path);

    Some(ManifestEntry {
        absolute_path,
        relative_path,
        announced_path,
        line,
    })
}

fn unavailable(root: &Path, source: std::io::Error) -> ManifestError {
    ManifestError::ScanRootUnavailable {
        root: root.to_path_buf(),
        source,
    }
}
