use std::collections::HashSet;
use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::error::ProducerError;

/// A record fetched from the source, ready to be published.
///
/// `payload` is the record's JSON text exactly as the source sent it, so numeric
/// fields keep their original representation all the way to the transformer.
#[derive(Debug)]
pub struct SourceRecord {
    pub partition_key: String,
    pub payload: Box<RawValue>,
}

impl SourceRecord {
    pub fn data(&self) -> Vec<u8> {
        self.payload.get().as_bytes().to_vec()
    }
}

/// Parse a source response body: a JSON array of objects, each carrying an `id`.
///
/// Any record without a usable `id` fails the whole batch, as nothing would be published
/// for a partial response anyway.
pub fn parse_batch(body: &str) -> Result<Vec<SourceRecord>, ProducerError> {
    let raw_records: Vec<Box<RawValue>> = serde_json::from_str(body).map_err(|e| {
        ProducerError::InvalidSourcePayload(format!("expected a JSON array of records: {}", e))
    })?;

    raw_records
        .into_iter()
        .enumerate()
        .map(|(index, payload)| {
            let header: RecordHeader = serde_json::from_str(payload.get()).map_err(|e| {
                ProducerError::InvalidSourcePayload(format!(
                    "record {} is not a JSON object: {}",
                    index, e
                ))
            })?;

            let partition_key = header
                .id
                .as_deref()
                .and_then(partition_key)
                .ok_or_else(|| {
                    ProducerError::InvalidSourcePayload(format!(
                        "record {} has no usable id",
                        index
                    ))
                })?;

            Ok(SourceRecord {
                partition_key,
                payload,
            })
        })
        .collect()
}

/// Stringify an `id` value to use it as the stream partition key.
///
/// Numbers keep their raw JSON text, whatever their range, strings are used without their
/// quotes.
pub fn partition_key(id: &RawValue) -> Option<String> {
    let text = id.get();

    if text.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
        Some(text.to_owned())
    } else if text.starts_with('"') {
        serde_json::from_str::<String>(text)
            .ok()
            .filter(|s| !s.is_empty())
    } else {
        None
    }
}

/// What the producer reads from a record before publishing it untouched.
struct RecordHeader {
    id: Option<Box<RawValue>>,
}

struct RecordHeaderVisitor;

impl<'de> Visitor<'de> for RecordHeaderVisitor {
    type Value = RecordHeader;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a JSON object with unique keys")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut keys = HashSet::new();
        let mut id = None;

        while let Some(key) = map.next_key::<String>()? {
            if keys.contains(&key) {
                return Err(de::Error::custom(format!("duplicate key `{}`", key)));
            }
            if key == "id" {
                id = Some(map.next_value::<Box<RawValue>>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
            keys.insert(key);
        }

        Ok(RecordHeader { id })
    }
}

impl<'de> Deserialize<'de> for RecordHeader {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordHeaderVisitor)
    }
}
