//! Boundary codec between in-memory records and storage rows.
//!
//! [`transform`] runs before a record is written; [`untransform`] runs on rows
//! read back. Both are driven by the schema's field kinds and are the identity
//! when no schema is bound.
//!
//! | kind         | transform                          | untransform                          |
//! |--------------|------------------------------------|--------------------------------------|
//! | boolean      | truthy to `1`, otherwise `0`       | `1` or `"1"` to `true`, else `false` |
//! | object/array | JSON text; falsy to `{}` / `[]`    | JSON text parsed                     |
//! | date         | epoch milliseconds                 | epoch milliseconds to date           |

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::schema::{FieldKind, Schema};
use crate::value::{Record, Value};

/// Convert a record into its storage representation.
///
/// Fails with [`Error::InvalidField`] on a key the schema does not declare.
pub fn transform(schema: Option<&Schema>, record: &Record) -> Result<Record> {
    let Some(schema) = schema else {
        return Ok(record.clone());
    };

    let mut out = Record::new();
    for (key, value) in record {
        let kind = kind_for(schema, key)?;
        out.insert(key.clone(), to_storage(kind, key, value)?);
    }
    Ok(out)
}

/// Convert a storage row back into its in-memory representation.
///
/// Fails with [`Error::InvalidField`] on a key the schema does not declare,
/// and with [`Error::InvalidJson`] when an object/array column holds text
/// that is not JSON.
pub fn untransform(schema: Option<&Schema>, record: &Record) -> Result<Record> {
    let Some(schema) = schema else {
        return Ok(record.clone());
    };

    let mut out = Record::new();
    for (key, value) in record {
        let kind = kind_for(schema, key)?;
        if let Some(value) = from_storage(kind, key, value)? {
            out.insert(key.clone(), value);
        }
    }
    Ok(out)
}

fn kind_for(schema: &Schema, key: &str) -> Result<FieldKind> {
    schema.kind_of(key).ok_or_else(|| Error::InvalidField {
        field: key.to_string(),
    })
}

fn to_storage(kind: FieldKind, key: &str, value: &Value) -> Result<Value> {
    let stored = match kind {
        FieldKind::Boolean => Value::Int(i64::from(value.is_truthy())),
        FieldKind::Object | FieldKind::Array => match value {
            Value::String(_) => value.clone(),
            v if v.is_truthy() => {
                let text = serde_json::to_string(&v.to_json()).map_err(|source| {
                    Error::InvalidJson {
                        field: key.to_string(),
                        source,
                    }
                })?;
                Value::String(text)
            }
            _ => Value::String(empty_json(kind).to_string()),
        },
        FieldKind::Date => match value {
            Value::Date(d) => Value::Int(d.timestamp_millis()),
            other => other.clone(),
        },
        _ => value.clone(),
    };
    Ok(stored)
}

fn from_storage(kind: FieldKind, key: &str, value: &Value) -> Result<Option<Value>> {
    let loaded = match kind {
        FieldKind::Boolean => match value {
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(1) => Value::Bool(true),
            Value::String(s) if s == "1" => Value::Bool(true),
            _ => Value::Bool(false),
        },
        FieldKind::Object | FieldKind::Array => match value {
            Value::String(s) if s.is_empty() => Value::Json(empty_json_value(kind)),
            Value::String(s) => {
                let json = serde_json::from_str(s).map_err(|source| Error::InvalidJson {
                    field: key.to_string(),
                    source,
                })?;
                Value::Json(json)
            }
            other => other.clone(),
        },
        FieldKind::Date => match value {
            Value::Int(0) => return Ok(None),
            Value::Int(millis) => date_or_keep(*millis, value),
            Value::Float(millis) if *millis == 0.0 => return Ok(None),
            // Fractions round to the nearest millisecond; out-of-range values stay as read.
            Value::Float(millis) if millis.is_finite() => date_or_keep(millis.round() as i64, value),
            other => other.clone(),
        },
        _ => value.clone(),
    };
    Ok(Some(loaded))
}

fn date_or_keep(millis: i64, original: &Value) -> Value {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(Value::Date)
        .unwrap_or_else(|| original.clone())
}

fn empty_json(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Array => "[]",
        _ => "{}",
    }
}

fn empty_json_value(kind: FieldKind) -> serde_json::Value {
    match kind {
        FieldKind::Array => serde_json::Value::Array(Vec::new()),
        _ => serde_json::Value::Object(serde_json::Map::new()),
    }
}
