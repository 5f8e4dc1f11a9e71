//! HTTP `Range` header handling
//!
//! Only the first range of a `bytes=` header is honoured; multipart ranges
//! are answered with that single window.

use std::fmt;

/// Range outside of the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("range not satisfiable for a resource of {total} bytes")]
pub struct RangeError {
    pub total: u64,
}

/// Parsed `Range: bytes=...` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// `bytes=start-end` or `bytes=start-`
    Bounded { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last `n` bytes
    Suffix { length: u64 },
}

/// Inclusive byte window resolved against a known resource length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl RangeRequest {
    /// Parses a header value; anything that is not a byte range is `None`
    /// and the header is then ignored.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (unit, spec) = header.split_once('=')?;
        if !unit.trim().eq_ignore_ascii_case("bytes") {
            return None;
        }

        let first = spec.split(',').next()?.trim();
        let (start, end) = first.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Self::Suffix {
                length: end.parse().ok()?,
            }),
            (false, true) => Some(Self::Bounded {
                start: start.parse().ok()?,
                end: None,
            }),
            (false, false) => Some(Self::Bounded {
                start: start.parse().ok()?,
                end: Some(end.parse().ok()?),
            }),
        }
    }

    /// Resolves the request against a resource of `total` bytes
    ///
    /// A missing end defaults to `total - 1` and an end past the resource is
    /// clamped to it. An inverted range or a start at or past `total` is
    /// not satisfiable.
    pub fn resolve(self, total: u64) -> Result<ByteRange, RangeError> {
        let unsatisfiable = RangeError { total };
        if total == 0 {
            return Err(unsatisfiable);
        }
        let last = total - 1;

        let (start, end) = match self {
            Self::Bounded { start, end } => {
                if start > last {
                    return Err(unsatisfiable);
                }
                let end = match end {
                    Some(end) if end < start => return Err(unsatisfiable),
                    Some(end) => end.min(last),
                    None => last,
                };
                (start, end)
            }
            Self::Suffix { length: 0 } => return Err(unsatisfiable),
            Self::Suffix { length } => (total.saturating_sub(length), last),
        };

        Ok(ByteRange { start, end, total })
    }
}

impl ByteRange {
    /// `end - start + 1`
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Never true: a resolved range holds at least one byte
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value of the `Content-Range` response header
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }

    /// Value of the `Range` header sent upstream
    pub fn to_request_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content_range())
    }
}

/// Parses `bytes start-end/total` (upstream `Content-Range`) and returns `total`
pub fn total_from_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}
