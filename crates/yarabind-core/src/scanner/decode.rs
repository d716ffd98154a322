//! Decoding of raw engine records into result structures.

use crate::engine::RawRule;
use crate::error::{Error, Result};
use crate::wire::{self, MetaType};
use bytes::Bytes;
use serde::ser::SerializeStruct;
use serde::Serialize;
use tracing::trace;

/// A typed metadata value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// Integer metadata
    Integer(i64),
    /// Text metadata
    String(String),
    /// Boolean metadata
    Boolean(bool),
}

impl MetaValue {
    /// The kind of this value
    pub fn meta_type(&self) -> MetaType {
        match self {
            MetaValue::Integer(_) => MetaType::Integer,
            MetaValue::String(_) => MetaType::String,
            MetaValue::Boolean(_) => MetaType::Boolean,
        }
    }
}

/// A metadata entry of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Metadata identifier
    pub id: String,
    /// Typed value
    pub value: MetaValue,
}

impl Meta {
    /// The kind of this entry
    pub fn meta_type(&self) -> MetaType {
        self.value.meta_type()
    }
}

impl Serialize for Meta {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Meta", 3)?;
        state.serialize_field("type", &self.meta_type())?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

/// One occurrence of a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Offset within the scanned window
    pub offset: u64,
    /// Length of the occurrence
    pub length: u64,
    /// Pattern identifier
    pub id: String,
    /// Captured bytes, when capture was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Bytes>,
}

/// A rule, as listed by introspection or reported by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Rule identifier
    pub id: String,
    /// Namespace, when the engine reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Tags, in declaration order
    pub tags: Vec<String>,
    /// Metadata, in declaration order
    pub metas: Vec<Meta>,
    /// Matches of this scan; empty for introspection
    pub matches: Vec<Match>,
}

/// Result tree of a scan or of introspection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Rules, in engine order
    pub rules: Vec<Rule>,
}

impl ScanResult {
    /// Returns true when no rule matched
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Serializes to the host JSON shape
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode a metadata record
pub fn decode_meta(record: &str) -> Result<Meta> {
    let fields = wire::decode_meta(record)?;

    let value = match MetaType::from_code(fields.type_code) {
        Some(MetaType::Integer) => MetaValue::Integer(
            fields
                .value
                .parse()
                .map_err(|_| Error::malformed_record("meta", record))?,
        ),
        Some(MetaType::Boolean) => MetaValue::Boolean(fields.value == "true"),
        Some(MetaType::String) | None => MetaValue::String(fields.value.to_string()),
    };

    Ok(Meta {
        id: fields.id.to_string(),
        value,
    })
}

/// Decode a match record, attaching captured bytes if any
pub fn decode_match(record: &str, bytes: Option<Bytes>) -> Result<Match> {
    let fields = wire::decode_match(record)?;

    Ok(Match {
        offset: fields.offset,
        length: fields.length,
        id: fields.id.to_string(),
        bytes,
    })
}

/// Decode one raw rule.
///
/// Captured bytes are paired with matches by position and clipped to
/// `matched_bytes`; they are dropped entirely when capture is off.
pub fn decode_rule(raw: RawRule, matched_bytes: Option<usize>) -> Result<Rule> {
    let RawRule {
        id,
        namespace,
        tags,
        metas,
        matches,
        datas,
    } = raw;

    let metas = metas
        .iter()
        .map(|m| decode_meta(m))
        .collect::<Result<Vec<_>>>()?;

    let mut datas = datas.into_iter();
    let matches = matches
        .iter()
        .map(|m| {
            let bytes = match matched_bytes {
                Some(cap) => datas.next().map(|d| d.slice(..d.len().min(cap))),
                None => None,
            };
            decode_match(m, bytes)
        })
        .collect::<Result<Vec<_>>>()?;

    trace!(
        "Decoded rule '{}' ({} metas, {} matches)",
        id,
        metas.len(),
        matches.len()
    );

    Ok(Rule {
        id,
        namespace: namespace.filter(|ns| !ns.is_empty()),
        tags,
        metas,
        matches,
    })
}

/// Decode every raw rule, preserving engine order
pub fn decode_rules(raw: Vec<RawRule>, matched_bytes: Option<usize>) -> Result<ScanResult> {
    let rules = raw
        .into_iter()
        .map(|r| decode_rule(r, matched_bytes))
        .collect::<Result<Vec<_>>>()?;
    Ok(ScanResult { rules })
}
