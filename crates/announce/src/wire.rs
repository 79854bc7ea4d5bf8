//! TCP wire format for the package list.
//!
//! # Wire format
//!
//! ```text
//! ANNOUNCE (server -> console):
//!   [4 bytes BE: total_length]
//!   [total_length bytes: lines]
//!
//! LINE (UTF-8):
//!   "<host>:<port>/files/<announced_path>\n"
//! ```
//!
//! Lines are concatenated in manifest order with no other delimiter.
//! An empty manifest is the header `00 00 00 00` and nothing else.

use nsdrop_manifest::Manifest;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::AnnounceError;

/// Length header size in bytes.
pub const HEADER_LEN: usize = 4;

/// Encodes the full payload (header followed by every line).
///
/// Fails without producing anything if the manifest is too large for
/// the 32-bit length header.
pub fn encode_manifest(manifest: &Manifest) -> Result<Vec<u8>, AnnounceError> {
    let total = manifest.total_length();
    let header = u32::try_from(total).map_err(|_| AnnounceError::PayloadTooLarge(total))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + header as usize);
    buf.extend_from_slice(&header.to_be_bytes());
    for line in manifest.lines() {
        buf.extend_from_slice(line.as_bytes());
    }

    debug_assert_eq!(buf.len() - HEADER_LEN, header as usize);
    Ok(buf)
}

/// Writes an encoded payload and flushes the stream.
pub async fn write_payload<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), AnnounceError> {
    writer
        .write_all(payload)
        .await
        .map_err(AnnounceError::Transmission)?;
    writer.flush().await.map_err(AnnounceError::Transmission)?;
    Ok(())
}

/// Reads a payload and returns its lines without the trailing newlines.
pub async fn read_manifest<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<String>, AnnounceError> {
    let total = reader
        .read_u32()
        .await
        .map_err(AnnounceError::Transmission)?;

    // The header is peer-controlled; grow with what actually arrives.
    let mut body = Vec::new();
    reader
        .take(u64::from(total))
        .read_to_end(&mut body)
        .await
        .map_err(AnnounceError::Transmission)?;
    if body.len() as u64 != u64::from(total) {
        return Err(AnnounceError::Transmission(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("body ended after {} of {total} bytes", body.len()),
        )));
    }

    let text = String::from_utf8(body)
        .map_err(|e| AnnounceError::Protocol(format!("invalid UTF-8 line: {e}")))?;

    if !text.is_empty() && !text.ends_with('\n') {
        return Err(AnnounceError::Protocol(
            "last line is not newline-terminated".into(),
        ));
    }

    Ok(text.lines().map(String::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsdrop_manifest::{ScanConfig, build_manifest};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Writer whose every write fails, like a socket reset by the peer.
    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn sample_manifest() -> (tempfile::TempDir, Manifest) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("games")).unwrap();
        std::fs::write(dir.path().join("games").join("Foo.nsp"), b"A").unwrap();
        std::fs::write(dir.path().join("games").join("Bar Baz.xci"), b"B").unwrap();

        let config = ScanConfig::new(dir.path(), vec!["games".into()], "10.0.0.5:8000");
        let manifest = build_manifest(&config).unwrap();
        (dir, manifest)
    }

    #[test]
    fn header_is_big_endian_total_length() {
        let (_dir, manifest) = sample_manifest();
        let payload = encode_manifest(&manifest).unwrap();

        let header = u32::from_be_bytes(payload[..HEADER_LEN].try_into().unwrap());
        assert_eq!(header as u64, manifest.total_length());
        assert_eq!((payload.len() - HEADER_LEN) as u64, manifest.total_length());
    }

    #[test]
    fn body_is_lines_in_order() {
        let (_dir, manifest) = sample_manifest();
        let payload = encode_manifest(&manifest).unwrap();

        let body = std::str::from_utf8(&payload[HEADER_LEN..]).unwrap();
        assert_eq!(
            body,
            "10.0.0.5:8000/files/games/Bar%20Baz.xci\n10.0.0.5:8000/files/games/Foo.nsp\n"
        );
    }

    #[test]
    fn empty_manifest_is_zero_header_only() {
        let payload = encode_manifest(&Manifest::default()).unwrap();
        assert_eq!(payload, vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn write_then_read_lines() {
        let (_dir, manifest) = sample_manifest();
        let payload = encode_manifest(&manifest).unwrap();

        let mut buf = Vec::new();
        write_payload(&mut buf, &payload).await.unwrap();
        assert_eq!(buf, payload);

        let mut cursor = &buf[..];
        let lines = read_manifest(&mut cursor).await.unwrap();
        assert_eq!(
            lines,
            vec![
                "10.0.0.5:8000/files/games/Bar%20Baz.xci",
                "10.0.0.5:8000/files/games/Foo.nsp"
            ]
        );
        assert!(cursor.is_empty());
    }

    #[tokio::test]
    async fn read_empty_manifest() {
        let mut cursor = &[0u8, 0, 0, 0][..];
        let lines = read_manifest(&mut cursor).await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn read_truncated_body_fails() {
        let mut buf = 10u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"short\n");

        let mut cursor = &buf[..];
        let result = read_manifest(&mut cursor).await;
        assert!(matches!(result, Err(AnnounceError::Transmission(_))));
    }

    #[tokio::test]
    async fn failed_write_is_transmission_error() {
        let (_dir, manifest) = sample_manifest();
        let payload = encode_manifest(&manifest).unwrap();

        let result = write_payload(&mut BrokenPipe, &payload).await;
        match result {
            Err(AnnounceError::Transmission(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected Transmission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_header_with_short_body_fails() {
        let mut buf = u32::MAX.to_be_bytes().to_vec();
        buf.extend_from_slice(b"10.0.0.5:8000/files/a.nsp\n");

        let mut cursor = &buf[..];
        let result = read_manifest(&mut cursor).await;
        match result {
            Err(AnnounceError::Transmission(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected Transmission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_unterminated_line_fails() {
        let mut buf = 3u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"abc");

        let mut cursor = &buf[..];
        let result = read_manifest(&mut cursor).await;
        assert!(matches!(result, Err(AnnounceError::Protocol(_))));
    }
}
