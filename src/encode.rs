//! JSON boundary: records in, structural values out.
//!
//! The engine only produces [`Value`]s; this is the one place that commits to
//! a text format. Map key order is preserved in both directions.

use std::fmt;
use std::io;

use log::debug;
use record_tree_core::Value;

#[derive(Debug)]
pub enum EncodeError {
    Json(serde_json::Error),
    Io(io::Error),
    /// Input element at this index is not a JSON object.
    NotARecord { index: usize, found: &'static str },
    /// Input document is not a JSON array.
    NotAnArray(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Json(e) => write!(f, "json error: {}", e),
            EncodeError::Io(e) => write!(f, "io error: {}", e),
            EncodeError::NotARecord { index, found } => {
                write!(f, "record {} is a {}, expected an object", index, found)
            }
            EncodeError::NotAnArray(found) => {
                write!(f, "expected an array of records, found a {}", found)
            }
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Json(e) => Some(e),
            EncodeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(e: serde_json::Error) -> Self {
        EncodeError::Json(e)
    }
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::Io(e)
    }
}

pub fn to_json_string(value: &Value) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(value)?)
}

pub fn to_json_pretty(value: &Value) -> Result<String, EncodeError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Write `value` as compact JSON followed by a newline.
pub fn to_json_writer<W: io::Write>(mut writer: W, value: &Value) -> Result<(), EncodeError> {
    serde_json::to_writer(&mut writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Parse a JSON array of objects into records.
pub fn records_from_json(text: &str) -> Result<Vec<Value>, EncodeError> {
    let records = match serde_json::from_str::<Value>(text)? {
        Value::List(items) => items,
        other => return Err(EncodeError::NotAnArray(other.type_name())),
    };
    if let Some((index, bad)) = records.iter().enumerate().find(|(_, r)| r.as_map().is_none()) {
        return Err(EncodeError::NotARecord {
            index,
            found: bad.type_name(),
        });
    }
    debug!("parsed {} records", records.len());
    Ok(records)
}
