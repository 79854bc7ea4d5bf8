//! Announced path encoding and download path resolution.
//!
//! Announced paths are relative paths percent-encoded as a sequence of URL
//! path segments: `/` stays a separator, everything outside the unreserved
//! set is escaped. Decoding an announced path yields the relative path
//! exactly, which is what lets the file server map a download request back
//! to disk without remembering what was announced.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::ManifestError;

/// Bytes escaped in an announced path.
///
/// Path-segment rules: unreserved characters and the sub-delimiters that
/// are legal inside a segment pass through, and `/` is kept as separator.
/// `%`, space, `?`, `#`, `;`, `,` and all non-ASCII bytes are escaped.
const PATH_SEGMENTS: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@')
    .remove(b'/');

/// Percent-encodes a `/`-separated relative path for the manifest.
pub fn encode_announced_path(relative_path: &str) -> String {
    utf8_percent_encode(relative_path, PATH_SEGMENTS).to_string()
}

/// Reverses [`encode_announced_path`].
pub fn decode_announced_path(announced_path: &str) -> Result<String, ManifestError> {
    percent_decode_str(announced_path)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| ManifestError::InvalidRequestPath(format!("not UTF-8 after decoding: {e}")))
}

/// Maps the path part of a `/files/<announced>` request back to disk.
///
/// The request path is percent-decoded, backslashes are normalized to
/// `/`, and the result must stay below `base_root`: absolute paths, drive
/// and UNC prefixes and `..` components are rejected.
pub fn resolve_download_path(
    base_root: &Path,
    request_path: &str,
) -> Result<PathBuf, ManifestError> {
    let decoded = decode_announced_path(request_path)?;
    let relative = decoded.replace('\\', "/");
    validate_relative_path(&relative)?;
    Ok(base_root.join(relative))
}

fn validate_relative_path(path: &str) -> Result<(), ManifestError> {
    if path.is_empty() {
        return Err(ManifestError::InvalidRequestPath("empty path".into()));
    }

    if path.contains('\0') {
        return Err(ManifestError::InvalidRequestPath(format!(
            "NUL byte not allowed: {path:?}"
        )));
    }

    // Drive prefix (`C:`) is a plain component on Unix, so check it by hand.
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(ManifestError::InvalidRequestPath(format!(
            "drive prefix not allowed: {path}"
        )));
    }

    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => {
                return Err(ManifestError::InvalidRequestPath(format!(
                    "parent directory traversal not allowed: {path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(ManifestError::InvalidRequestPath(format!(
                    "absolute path not allowed: {path}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_is_unchanged() {
        assert_eq!(encode_announced_path("games/Foo.nsp"), "games/Foo.nsp");
    }

    #[test]
    fn space_is_escaped() {
        assert_eq!(encode_announced_path("Bar Baz.xci"), "Bar%20Baz.xci");
    }

    #[test]
    fn reserved_characters_are_escaped() {
        assert_eq!(
            encode_announced_path("a#b?c;d,e%f.nsp"),
            "a%23b%3Fc%3Bd%2Ce%25f.nsp"
        );
        assert_eq!(
            encode_announced_path("Zelda [01007EF00011E000][v0].nsp"),
            "Zelda%20%5B01007EF00011E000%5D%5Bv0%5D.nsp"
        );
    }

    #[test]
    fn segment_safe_characters_pass_through() {
        assert_eq!(encode_announced_path("a-b_c.d~e$f&g+h:i=j@k"), "a-b_c.d~e$f&g+h:i=j@k");
    }

    #[test]
    fn non_ascii_is_utf8_escaped() {
        assert_eq!(
            encode_announced_path("ポケモン.nsp"),
            "%E3%83%9D%E3%82%B1%E3%83%A2%E3%83%B3.nsp"
        );
    }

    #[test]
    fn decode_recovers_relative_path() {
        let samples = [
            "games/Foo.nsp",
            "Games/switch/Bar Baz.xci",
            "odd/100% done #1?.nsz",
            "unicode/ポケモン (JP).nsp",
            "plus+and&amp=eq.nsp",
        ];
        for sample in samples {
            let encoded = encode_announced_path(sample);
            assert!(!encoded.contains(' '));
            assert_eq!(decode_announced_path(&encoded).unwrap(), sample);
        }
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(decode_announced_path("bad%FF.nsp").is_err());
    }

    #[test]
    fn resolve_joins_onto_base() {
        let resolved =
            resolve_download_path(Path::new("/data"), "games/Bar%20Baz.xci").unwrap();
        assert_eq!(resolved, PathBuf::from("/data/games/Bar Baz.xci"));
    }

    #[test]
    fn resolve_normalizes_backslashes() {
        let resolved = resolve_download_path(Path::new("/data"), "games%5CFoo.nsp").unwrap();
        assert_eq!(resolved, PathBuf::from("/data/games/Foo.nsp"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let base = Path::new("/data");
        assert!(resolve_download_path(base, "../etc/passwd").is_err());
        assert!(resolve_download_path(base, "games/%2E%2E/%2E%2E/etc").is_err());
        assert!(resolve_download_path(base, "..%2F..%2Fsecret").is_err());
        assert!(resolve_download_path(base, "%5C..%5Csecret").is_err());
    }

    #[test]
    fn resolve_rejects_absolute_and_prefixed() {
        let base = Path::new("/data");
        assert!(resolve_download_path(base, "").is_err());
        assert!(resolve_download_path(base, "%2Fetc%2Fpasswd").is_err());
        assert!(resolve_download_path(base, "C:%5CWindows").is_err());
        assert!(resolve_download_path(base, "%5C%5Cserver%5Cshare").is_err());
        assert!(resolve_download_path(base, "a%00b.nsp").is_err());
    }
}
