//! Record types flowing through a data app.

use std::fmt;

use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Errors raised while reading or editing a JSON payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload path '{path}' does not address an object field")]
    InvalidPath { path: String },
}

/// Opaque record payload, typically JSON encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes the payload as a JSON object.
    pub fn to_map(&self) -> Result<Map<String, Value>, PayloadError> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    /// Reads the value at a dotted path, e.g. `user.email` or `actions.1`.
    ///
    /// Returns `None` when the payload is not JSON or the path is absent.
    pub fn get(&self, path: &str) -> Option<Value> {
        let root: Value = serde_json::from_slice(&self.0).ok()?;
        let mut current = &root;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Writes `value` at a dotted path, creating intermediate objects as needed.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), PayloadError> {
        let mut root: Value = if self.0.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(&self.0)?
        };

        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(PayloadError::InvalidPath {
                path: path.to_string(),
            });
        };

        let mut current = &mut root;
        for segment in parents {
            current = match current {
                Value::Object(map) => map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => {
                    return Err(PayloadError::InvalidPath {
                        path: path.to_string(),
                    });
                }
            };
        }

        match current {
            Value::Object(map) => {
                map.insert(last.to_string(), value.into());
            }
            _ => {
                return Err(PayloadError::InvalidPath {
                    path: path.to_string(),
                });
            }
        }

        self.0 = serde_json::to_vec(&root)?;
        Ok(())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// A single keyed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub payload: Payload,
    pub timestamp: OffsetDateTime,
}

impl Record {
    /// Creates a record stamped with the current time.
    pub fn new(key: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A record a function could not transform, with the reason.
///
/// These are dead-letter candidates. No runner writes them anywhere yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordWithError {
    pub record: Record,
    pub cause: String,
}

impl RecordWithError {
    pub fn new(record: Record, cause: impl Into<String>) -> Self {
        Self {
            record,
            cause: cause.into(),
        }
    }
}
