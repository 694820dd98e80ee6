//! Flattening of decoded records into fixed-layout CSV lines.
//!
//! A line always carries the nine columns of [`CSV_COLUMNS`], in that order. `id` and `name`
//! are mandatory, every other column is a measurement that may be absent and is then left
//! empty. Present measurements are copied as written in the source, never re-formatted.
use serde_json::value::RawValue;
use thiserror::Error;

use crate::decode::StructuredRecord;

pub const CSV_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "abv",
    "ibu",
    "target_fg",
    "target_og",
    "ebc",
    "srm",
    "ph",
];

/// Columns that are left empty when the record has no value for them.
pub const OPTIONAL_FIELDS: [&str; 7] = ["abv", "ibu", "target_fg", "target_og", "ebc", "srm", "ph"];

/// Legacy marker for a missing value, treated like JSON `null`.
pub const ABSENT_SENTINEL: &str = "None";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has no {0}")]
    MissingField(&'static str),
    #[error("record field {field} is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// One normalized CSV line, newline terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine(String);

impl OutputLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

/// A record field, classified from its original JSON text.
enum Field<'a> {
    Absent,
    Number(&'a str),
    Text(String),
    Other,
}

fn field<'a>(
    record: &'a StructuredRecord,
    name: &'static str,
) -> Result<Field<'a>, ValidationError> {
    let Some(raw) = record.get(name) else {
        return Ok(Field::Absent);
    };
    let text = raw.get();

    if text == "null" {
        Ok(Field::Absent)
    } else if is_number_literal(text) {
        Ok(Field::Number(text))
    } else if text.starts_with('"') {
        let s: String = serde_json::from_str(text).map_err(|_| ValidationError::InvalidField {
            field: name,
            reason: "not a valid string",
        })?;
        if s == ABSENT_SENTINEL {
            Ok(Field::Absent)
        } else {
            Ok(Field::Text(s))
        }
    } else {
        Ok(Field::Other)
    }
}

/// A JSON number literal, checked for syntax only: `1e400` is as valid as `4.5`.
fn is_number_literal(s: &str) -> bool {
    s.starts_with(|c: char| c == '-' || c.is_ascii_digit())
        && !s.contains(char::is_whitespace)
        && serde_json::from_str::<&RawValue>(s).is_ok()
}

fn id_column(record: &StructuredRecord) -> Result<String, ValidationError> {
    match field(record, "id")? {
        Field::Absent => Err(ValidationError::MissingField("id")),
        Field::Number(raw) => Ok(raw.to_owned()),
        Field::Text(s) if s.is_empty() => Err(ValidationError::MissingField("id")),
        Field::Text(s) if s.contains([',', '"', '\r', '\n']) => Err(ValidationError::InvalidField {
            field: "id",
            reason: "contains a CSV delimiter",
        }),
        Field::Text(s) => Ok(s),
        Field::Other => Err(ValidationError::InvalidField {
            field: "id",
            reason: "expected a number or a string",
        }),
    }
}

fn name_column(record: &StructuredRecord) -> Result<String, ValidationError> {
    match field(record, "name")? {
        Field::Absent => Err(ValidationError::MissingField("name")),
        Field::Text(s) => Ok(format!("\"{}\"", s.replace('"', "\"\""))),
        Field::Number(_) | Field::Other => Err(ValidationError::InvalidField {
            field: "name",
            reason: "expected a string",
        }),
    }
}

fn optional_column(
    record: &StructuredRecord,
    name: &'static str,
) -> Result<String, ValidationError> {
    match field(record, name)? {
        Field::Absent => Ok(String::new()),
        Field::Number(raw) => Ok(raw.to_owned()),
        Field::Text(s) if is_number_literal(&s) => Ok(s),
        Field::Text(_) | Field::Other => Err(ValidationError::InvalidField {
            field: name,
            reason: "expected a number",
        }),
    }
}

/// Flatten a decoded record into its CSV line.
pub fn normalize(record: &StructuredRecord) -> Result<OutputLine, ValidationError> {
    let mut columns = Vec::with_capacity(CSV_COLUMNS.len());
    columns.push(id_column(record)?);
    columns.push(name_column(record)?);
    for name in OPTIONAL_FIELDS {
        columns.push(optional_column(record, name)?);
    }

    let mut line = columns.join(",");
    line.push('\n');
    Ok(OutputLine(line))
}
