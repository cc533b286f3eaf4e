/// Document identifiers
///
/// Identifiers are random 128-bit values rendered as 32 lowercase hex
/// characters, both in stored documents and in the HTTP API.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a string is not a valid identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid identifier: {0}")]
pub struct InvalidId(pub String);

/// Unique identifier of a stored document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(Uuid);

impl DocId {
    /// Generates a new random identifier
    pub fn new() -> Self {
        DocId(Uuid::new_v4())
    }

    /// Parses the 32-character hex form
    ///
    /// Hyphenated UUIDs and any other length are rejected so that every id
    /// has exactly one textual representation.
    pub fn parse(value: &str) -> Result<Self, InvalidId> {
        if value.len() != 32 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidId(value.to_string()));
        }

        Uuid::parse_str(value)
            .map(DocId)
            .map_err(|_| InvalidId(value.to_string()))
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for DocId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocId::parse(s)
    }
}

impl Serialize for DocId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DocId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<DocId> for Value {
    fn from(id: DocId) -> Self {
        Value::String(id.to_string())
    }
}

impl From<&DocId> for Value {
    fn from(id: &DocId) -> Self {
        Value::String(id.to_string())
    }
}
