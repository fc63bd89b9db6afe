//! JSON wire format for `POST /v1/process`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use strand_core::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub records: Vec<WireRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub records: Vec<WireRecord>,
}

/// A record as exchanged with the platform: base64 value, unix-second timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub key: String,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    pub timestamp: i64,
}

#[derive(Debug, thiserror::Error)]
#[error("record {key}: timestamp {timestamp} is out of range")]
pub struct TimestampOutOfRange {
    pub key: String,
    pub timestamp: i64,
}

impl From<Record> for WireRecord {
    fn from(record: Record) -> Self {
        Self {
            timestamp: record.timestamp.unix_timestamp(),
            key: record.key,
            value: record.payload.into_bytes(),
        }
    }
}

impl TryFrom<WireRecord> for Record {
    type Error = TimestampOutOfRange;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        let timestamp = OffsetDateTime::from_unix_timestamp(wire.timestamp).map_err(|_| {
            TimestampOutOfRange {
                key: wire.key.clone(),
                timestamp: wire.timestamp,
            }
        })?;
        Ok(Record::new(wire.key, wire.value).with_timestamp(timestamp))
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
