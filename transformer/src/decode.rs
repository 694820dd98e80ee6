use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose;
use base64::Engine;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("record envelope is not valid base64: {0}")]
    InvalidEnvelope(#[from] base64::DecodeError),
    #[error("record payload is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("record payload is not a JSON object: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// A decoded record: top-level keys mapped to their JSON text as published.
///
/// Values are kept as raw JSON so numbers are never re-formatted on their way to CSV.
#[derive(Debug)]
pub struct StructuredRecord {
    fields: HashMap<String, Box<RawValue>>,
}

impl StructuredRecord {
    /// Strictly parse `text` as a JSON object. A key appearing twice is an error.
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.fields.get(field).map(|value| value.as_ref())
    }
}

struct StructuredRecordVisitor;

impl<'de> Visitor<'de> for StructuredRecordVisitor {
    type Value = StructuredRecord;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a JSON object with unique keys")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = HashMap::with_capacity(map.size_hint().unwrap_or(0));

        while let Some((key, value)) = map.next_entry::<String, Box<RawValue>>()? {
            match fields.entry(key) {
                Entry::Occupied(entry) => {
                    return Err(de::Error::custom(format!("duplicate key `{}`", entry.key())));
                }
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }

        Ok(StructuredRecord { fields })
    }
}

impl<'de> Deserialize<'de> for StructuredRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(StructuredRecordVisitor)
    }
}

/// Decode a transport envelope (base64 text) into a `StructuredRecord`.
pub fn decode(raw: &[u8]) -> Result<StructuredRecord, DecodeError> {
    let bytes = general_purpose::STANDARD.decode(raw)?;
    let text = String::from_utf8(bytes)?;

    StructuredRecord::from_json(&text)
}
