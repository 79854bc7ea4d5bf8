//! `Range` header handling for package downloads.
//!
//! Only a single byte range is honored. Multi-range or malformed headers
//! fall back to the full body, as RFC 9110 allows.

/// What to send for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteRange {
    Full,
    /// Inclusive byte span.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

impl ByteRange {
    /// Parses `header` against a file of `len` bytes.
    pub fn parse(header: Option<&str>, len: u64) -> Self {
        let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
            return Self::Full;
        };
        if spec.contains(',') {
            return Self::Full;
        }
        let Some((first, last)) = spec.trim().split_once('-') else {
            return Self::Full;
        };
        let (first, last) = (first.trim(), last.trim());

        if first.is_empty() {
            // Suffix range: the last `n` bytes.
            let Ok(n) = last.parse::<u64>() else {
                return Self::Full;
            };
            if n == 0 || len == 0 {
                return Self::Unsatisfiable;
            }
            return Self::Partial {
                start: len.saturating_sub(n),
                end: len - 1,
            };
        }

        let Ok(start) = first.parse::<u64>() else {
            return Self::Full;
        };
        let end = if last.is_empty() {
            None
        } else {
            match last.parse::<u64>() {
                Ok(end) if end >= start => Some(end),
                _ => return Self::Full,
            }
        };

        if start >= len {
            return Self::Unsatisfiable;
        }
        let end = end.map_or(len - 1, |e| e.min(len - 1));
        Self::Partial { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_is_full() {
        assert_eq!(ByteRange::parse(None, 100), ByteRange::Full);
    }

    #[test]
    fn closed_range() {
        assert_eq!(
            ByteRange::parse(Some("bytes=0-99"), 1000),
            ByteRange::Partial { start: 0, end: 99 }
        );
    }

    #[test]
    fn end_is_clamped() {
        assert_eq!(
            ByteRange::parse(Some("bytes=900-5000"), 1000),
            ByteRange::Partial {
                start: 900,
                end: 999
            }
        );
    }

    #[test]
    fn open_ended_range() {
        assert_eq!(
            ByteRange::parse(Some("bytes=10-"), 20),
            ByteRange::Partial { start: 10, end: 19 }
        );
    }

    #[test]
    fn suffix_range() {
        assert_eq!(
            ByteRange::parse(Some("bytes=-5"), 20),
            ByteRange::Partial { start: 15, end: 19 }
        );
        assert_eq!(
            ByteRange::parse(Some("bytes=-500"), 20),
            ByteRange::Partial { start: 0, end: 19 }
        );
    }

    #[test]
    fn unsatisfiable_ranges() {
        assert_eq!(
            ByteRange::parse(Some("bytes=20-30"), 20),
            ByteRange::Unsatisfiable
        );
        assert_eq!(ByteRange::parse(Some("bytes=-0"), 20), ByteRange::Unsatisfiable);
        assert_eq!(ByteRange::parse(Some("bytes=0-"), 0), ByteRange::Unsatisfiable);
    }

    #[test]
    fn malformed_or_multi_is_full() {
        for header in ["items=0-1", "bytes=a-b", "bytes=5-1", "bytes=0-1,4-5", "bytes=7"] {
            assert_eq!(ByteRange::parse(Some(header), 20), ByteRange::Full, "{header}");
        }
    }
}
