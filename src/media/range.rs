//! HTTP byte-range header parsing.

use thiserror::Error;

/// An inclusive byte range `[start, end]` within an object of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes the range covers; never zero, the bounds are inclusive.
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Render the `Content-Range` header value for an object of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// Header did not parse as a single `bytes=a-b` range. Callers fall back
    /// to a full-body 200 response.
    #[error("malformed range header")]
    Malformed,
    /// Parsed, but lies outside the stored object; answered with 416.
    #[error("range not satisfiable")]
    Unsatisfiable,
}

/// Parse a `Range` header value against an object of `size` bytes.
///
/// Supports a single `bytes=a-b` range; `b` defaults to `size - 1` when
/// omitted and is clamped to the object end. Multipart and suffix ranges are
/// not supported and report as malformed.
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Malformed)?;

    if spec.contains(',') {
        return Err(RangeError::Malformed);
    }

    let (start_str, end_str) = spec.split_once('-').ok_or(RangeError::Malformed)?;
    let start: u64 = start_str.trim().parse().map_err(|_| RangeError::Malformed)?;

    let end = match end_str.trim() {
        "" => size.saturating_sub(1),
        s => {
            let end: u64 = s.parse().map_err(|_| RangeError::Malformed)?;
            end.min(size.saturating_sub(1))
        }
    };

    if size == 0 || start >= size || start > end {
        return Err(RangeError::Unsatisfiable);
    }

    Ok(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_range() {
        let r = parse_range("bytes=500000-500999", 1_000_000).unwrap();
        assert_eq!(r.start, 500_000);
        assert_eq!(r.end, 500_999);
        assert_eq!(r.len(), 1000);
        assert_eq!(r.content_range(1_000_000), "bytes 500000-500999/1000000");
    }

    #[test]
    fn open_ended_range_runs_to_object_end() {
        let r = parse_range("bytes=10-", 100).unwrap();
        assert_eq!(r, ByteRange { start: 10, end: 99 });
    }

    #[test]
    fn end_is_clamped_to_object_end() {
        let r = parse_range("bytes=10-5000", 100).unwrap();
        assert_eq!(r.end, 99);
    }

    #[test]
    fn unsatisfiable_ranges() {
        assert_eq!(parse_range("bytes=100-", 100), Err(RangeError::Unsatisfiable));
        assert_eq!(
            parse_range("bytes=50-40", 100),
            Err(RangeError::Unsatisfiable)
        );
        assert_eq!(parse_range("bytes=0-", 0), Err(RangeError::Unsatisfiable));
    }

    #[test]
    fn malformed_ranges() {
        assert_eq!(parse_range("chunks=0-10", 100), Err(RangeError::Malformed));
        assert_eq!(parse_range("bytes=-500", 100), Err(RangeError::Malformed));
        assert_eq!(parse_range("bytes=a-b", 100), Err(RangeError::Malformed));
        assert_eq!(
            parse_range("bytes=0-10,20-30", 100),
            Err(RangeError::Malformed)
        );
        assert_eq!(parse_range("bytes", 100), Err(RangeError::Malformed));
    }

    proptest! {
        #![proptest_config(ProptestConfig { max_global_rejects: 100_000, ..ProptestConfig::default() })]
        #[test]
        fn valid_ranges_parse_exactly(size in 1u64..10_000_000, a in 0u64..10_000_000, b in 0u64..10_000_000) {
            prop_assume!(a <= b && b < size);
            let r = parse_range(&format!("bytes={a}-{b}"), size).unwrap();
            prop_assert_eq!(r.start, a);
            prop_assert_eq!(r.end, b);
            prop_assert_eq!(r.len(), b - a + 1);
        }

        #[test]
        fn start_past_end_of_object_never_satisfies(size in 0u64..1000, a in 0u64..2000) {
            prop_assume!(a >= size);
            prop_assert_eq!(parse_range(&format!("bytes={a}-"), size), Err(RangeError::Unsatisfiable));
        }
    }
}
