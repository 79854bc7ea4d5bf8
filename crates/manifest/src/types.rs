//! Manifest data types.

use std::path::PathBuf;

use crate::FILES_ROUTE;

/// Scan configuration shared read-only by every announce request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Filesystem path that scan roots and download paths are relative to.
    pub base_root: PathBuf,
    /// Folders below `base_root` to scan, in announce order.
    pub scan_roots: Vec<String>,
    /// `host:port` the console uses to reach the file server.
    pub host_address: String,
}

impl ScanConfig {
    pub fn new(
        base_root: impl Into<PathBuf>,
        scan_roots: Vec<String>,
        host_address: impl Into<String>,
    ) -> Self {
        Self {
            base_root: base_root.into(),
            scan_roots,
            host_address: host_address.into(),
        }
    }

    /// Renders the manifest line for an announced path, trailing newline included.
    pub fn download_line(&self, announced_path: &str) -> String {
        format!("{}{FILES_ROUTE}{announced_path}\n", self.host_address)
    }
}

/// One discovered package file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Location on disk.
    pub absolute_path: PathBuf,
    /// Path below the base root, always with `/` separators.
    pub relative_path: String,
    /// Percent-encoded `relative_path`, as embedded in the line.
    pub announced_path: String,
    /// `"{host}/files/{announced_path}\n"`.
    pub line: String,
}

impl ManifestEntry {
    /// Byte length of the formatted line.
    pub fn line_length(&self) -> u64 {
        self.line.len() as u64
    }
}

/// Ordered package list produced by one scan pass.
///
/// Only the builder can append entries, so `total_length` always equals
/// the sum of the entries' line lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    total_length: u64,
}

impl Manifest {
    pub(crate) fn push(&mut self, entry: ManifestEntry) {
        self.total_length += entry.line_length();
        self.entries.push(entry);
    }

    /// Entries in scan-root order, then discovery order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Sum of all line lengths in bytes.
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Formatted lines in manifest order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.line.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(relative: &str) -> ManifestEntry {
        let config = ScanConfig::new("/data", vec![], "10.0.0.5:8000");
        ManifestEntry {
            absolute_path: PathBuf::from("/data").join(relative),
            relative_path: relative.into(),
            announced_path: relative.into(),
            line: config.download_line(relative),
        }
    }

    #[test]
    fn download_line_format() {
        let config = ScanConfig::new("/data", vec!["games".into()], "10.0.0.5:8000");
        assert_eq!(
            config.download_line("games/Foo.nsp"),
            "10.0.0.5:8000/files/games/Foo.nsp\n"
        );
    }

    #[test]
    fn empty_manifest_has_zero_length() {
        let manifest = Manifest::default();
        assert!(manifest.is_empty());
        assert_eq!(manifest.total_length(), 0);
        assert_eq!(manifest.lines().count(), 0);
    }

    #[test]
    fn push_accumulates_total_length() {
        let mut manifest = Manifest::default();
        let a = entry("games/a.nsp");
        let b = entry("games/bb.xci");
        let expected = a.line.len() + b.line.len();

        manifest.push(a);
        manifest.push(b);

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.total_length(), expected as u64);
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(
            lines,
            vec![
                "10.0.0.5:8000/files/games/a.nsp\n",
                "10.0.0.5:8000/files/games/bb.xci\n"
            ]
        );
    }
}
