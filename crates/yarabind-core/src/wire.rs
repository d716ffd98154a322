//! Colon-delimited record format exchanged with the engine.
//!
//! Three record families cross the engine boundary as plain strings:
//!
//! - diagnostics: `<sourceIndex>:<line>:<message>`
//! - metadata: `<type>:<id>:<value>`
//! - matches: `<offset>:<length>:<id>`
//!
//! Every record is split on its first two colons only. The third field is
//! taken verbatim and may itself contain colons; the first two may not.
//! Nothing is escaped on encode, so a colon in an identifier placed in one of
//! the leading fields cannot be represented. Engines never emit such
//! identifiers (rule, meta and pattern identifiers are restricted to
//! `[A-Za-z0-9_$]`), and decoding rejects records whose numeric fields do not
//! parse.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Record field separator
pub const SEPARATOR: char = ':';

/// Split a record into its two leading fields and the verbatim remainder.
///
/// Returns `None` when the record has fewer than two separators.
pub fn split_record(record: &str) -> Option<(&str, &str, &str)> {
    let mut fields = record.splitn(3, SEPARATOR);
    let first = fields.next()?;
    let second = fields.next()?;
    let rest = fields.next()?;
    Some((first, second, rest))
}

/// A compiler error or warning attributed to one rule source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Index of the rule source that produced the diagnostic
    pub source_index: usize,
    /// 1-based line within that source
    pub line: u32,
    /// Compiler message, verbatim
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic
    pub fn new(source_index: usize, line: u32, message: impl Into<String>) -> Self {
        Self {
            source_index,
            line,
            message: message.into(),
        }
    }

    /// Encode into the `<sourceIndex>:<line>:<message>` record form
    pub fn encode(&self) -> String {
        encode_diagnostic(self.source_index, self.line, &self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source {} line {}: {}", self.source_index, self.line, self.message)
    }
}

/// Encode a diagnostic record
pub fn encode_diagnostic(source_index: usize, line: u32, message: &str) -> String {
    format!("{source_index}{SEPARATOR}{line}{SEPARATOR}{message}")
}

/// Decode a diagnostic record
pub fn decode_diagnostic(record: &str) -> Result<Diagnostic> {
    let malformed = || Error::malformed_record("diagnostic", record);

    let (index, line, message) = split_record(record).ok_or_else(malformed)?;
    let source_index = index.parse().map_err(|_| malformed())?;
    let line = line.parse().map_err(|_| malformed())?;

    Ok(Diagnostic {
        source_index,
        line,
        message: message.to_string(),
    })
}

/// Metadata value kinds, numbered as the engine numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetaType {
    /// Signed integer
    Integer = 1,
    /// Text
    String = 2,
    /// `true` / `false`
    Boolean = 3,
}

impl MetaType {
    /// Numeric code used on the wire
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a wire code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MetaType::Integer),
            2 => Some(MetaType::String),
            3 => Some(MetaType::Boolean),
            _ => None,
        }
    }
}

impl Serialize for MetaType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Fields of a decoded metadata record, still untyped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRecord<'a> {
    /// Raw type code
    pub type_code: i64,
    /// Metadata identifier
    pub id: &'a str,
    /// Value text, verbatim
    pub value: &'a str,
}

/// Encode a metadata record. Booleans are expected as `true` / `false`.
pub fn encode_meta(kind: MetaType, id: &str, value: &str) -> String {
    format!("{}{SEPARATOR}{id}{SEPARATOR}{value}", kind.code())
}

/// Decode a metadata record
pub fn decode_meta(record: &str) -> Result<MetaRecord<'_>> {
    let (kind, id, value) =
        split_record(record).ok_or_else(|| Error::malformed_record("meta", record))?;
    let type_code = kind
        .parse()
        .map_err(|_| Error::malformed_record("meta", record))?;

    Ok(MetaRecord {
        type_code,
        id,
        value,
    })
}

/// Fields of a decoded match record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord<'a> {
    /// Offset of the match within the scanned window
    pub offset: u64,
    /// Length of the match
    pub length: u64,
    /// Pattern identifier, e.g. `$s1`
    pub id: &'a str,
}

/// Encode a match record
pub fn encode_match(offset: u64, length: u64, id: &str) -> String {
    format!("{offset}{SEPARATOR}{length}{SEPARATOR}{id}")
}

/// Decode a match record
pub fn decode_match(record: &str) -> Result<MatchRecord<'_>> {
    let malformed = || Error::malformed_record("match", record);

    let (offset, length, id) = split_record(record).ok_or_else(malformed)?;

    Ok(MatchRecord {
        offset: offset.parse().map_err(|_| malformed())?,
        length: length.parse().map_err(|_| malformed())?,
        id,
    })
}
