//! Scan request validation.
//!
//! Requests arrive in the host shape
//! `{buffer?, offset?, length?, filename?, matchedBytes?, flags?, timeout?}` with
//! signed integers, so that out-of-range values can be reported rather than
//! rejected by the parser. [`validate`] turns a request into a [`ValidatedScan`]
//! whose buffer window is guaranteed to lie inside the buffer.

use super::ScannerConfig;
use crate::engine::EngineTarget;
use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::path::PathBuf;
use std::time::Duration;

/// Scan flag bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanFlags(u32);

impl ScanFlags {
    /// Record only the first occurrence of each pattern
    pub const FAST_MODE: ScanFlags = ScanFlags(1);

    /// No flags
    pub const fn empty() -> Self {
        ScanFlags(0)
    }

    /// Build from raw bits; unknown bits are kept and ignored
    pub const fn from_bits(bits: u32) -> Self {
        ScanFlags(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is set
    pub const fn contains(self, other: ScanFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ScanFlags {
    type Output = ScanFlags;

    fn bitor(self, rhs: ScanFlags) -> ScanFlags {
        ScanFlags(self.0 | rhs.0)
    }
}

/// A scan request in the host shape
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// In-memory content
    pub buffer: Option<Bytes>,
    /// Start of the window within `buffer`; defaults to 0
    pub offset: Option<i64>,
    /// Window length; defaults to the rest of the buffer
    pub length: Option<i64>,
    /// File to scan instead of a buffer
    pub filename: Option<PathBuf>,
    /// Cap on captured bytes per match
    pub matched_bytes: Option<i64>,
    /// Scan flags
    pub flags: Option<ScanFlags>,
    /// Timeout in seconds; 0 disables it
    pub timeout: Option<i64>,
}

impl ScanRequest {
    /// Creates a request scanning a buffer
    pub fn from_buffer(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: Some(buffer.into()),
            ..Self::default()
        }
    }

    /// Creates a request scanning a file
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON request
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the buffer offset
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the buffer window length
    pub fn length(mut self, length: i64) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the captured-bytes cap
    pub fn matched_bytes(mut self, matched_bytes: i64) -> Self {
        self.matched_bytes = Some(matched_bytes);
        self
    }

    /// Sets the scan flags
    pub fn flags(mut self, flags: ScanFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Sets the timeout in seconds
    pub fn timeout(mut self, seconds: i64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

/// A normalized scan target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// `data[offset..offset + length]`
    Buffer {
        /// The whole buffer
        data: Bytes,
        /// Window start
        offset: usize,
        /// Window length
        length: usize,
    },
    /// A file on disk
    File(PathBuf),
}

impl ScanTarget {
    /// Borrow as an engine target; buffer targets are cut to their window
    pub fn engine_target(&self) -> EngineTarget<'_> {
        match self {
            ScanTarget::Buffer {
                data,
                offset,
                length,
            } => EngineTarget::Memory(&data[*offset..*offset + *length]),
            ScanTarget::File(path) => EngineTarget::File(path),
        }
    }
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedScan {
    /// What to scan
    pub target: ScanTarget,
    /// Captured-bytes cap; `None` when capture is off
    pub matched_bytes: Option<usize>,
    /// Record only the first occurrence of each pattern
    pub fast_mode: bool,
    /// Scan timeout
    pub timeout: Option<Duration>,
}

/// Validate and normalize a scan request
pub fn validate(request: ScanRequest, config: &ScannerConfig) -> Result<ValidatedScan> {
    let filename = request.filename.filter(|f| !f.as_os_str().is_empty());

    let target = match (request.buffer, filename) {
        (Some(_), Some(_)) => return Err(Error::AmbiguousTarget),
        (None, None) => return Err(Error::MissingTarget),
        (None, Some(path)) => ScanTarget::File(path),
        (Some(data), None) => {
            let (offset, length) = window(data.len(), request.offset, request.length)?;
            ScanTarget::Buffer {
                data,
                offset,
                length,
            }
        }
    };

    let matched_bytes = match request.matched_bytes {
        Some(n) if n < 0 => return Err(Error::MatchedBytesOutOfBounds { matched_bytes: n }),
        Some(0) | None => None,
        Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
    };

    let timeout = match request.timeout {
        Some(t) if t < 0 => return Err(Error::TimeoutOutOfBounds { timeout: t }),
        Some(0) => None,
        Some(t) => Some(Duration::from_secs(t.unsigned_abs())),
        None => config.default_timeout,
    };

    let flags = request.flags.unwrap_or(config.default_flags);

    Ok(ValidatedScan {
        target,
        matched_bytes,
        fast_mode: flags.contains(ScanFlags::FAST_MODE),
        timeout,
    })
}

/// Resolve and bound-check a buffer window
fn window(buffer_len: usize, offset: Option<i64>, length: Option<i64>) -> Result<(usize, usize)> {
    let offset = match offset {
        None => 0,
        Some(requested) => usize::try_from(requested)
            .ok()
            .filter(|o| *o <= buffer_len)
            .ok_or(Error::OffsetOutOfBounds {
                offset: requested,
                buffer_len,
            })?,
    };

    let length = match length {
        None => buffer_len - offset,
        Some(requested) => usize::try_from(requested)
            .ok()
            .filter(|l| *l <= buffer_len && offset + *l <= buffer_len)
            .ok_or(Error::LengthOutOfBounds {
                length: requested,
                offset,
                buffer_len,
            })?,
    };

    Ok((offset, length))
}
