//! Record validation and conversion.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::field::FieldType;
use super::kind::FieldKind;
use super::fields::Schema;
use crate::value::{truncate_to_millis, Record, Value};

/// Options controlling a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Stop at the first violation instead of collecting all of them.
    pub abort_early: bool,
}

impl ValidateOptions {
    /// Collect every violation in the record.
    pub fn all_errors() -> Self {
        Self { abort_early: false }
    }
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self { abort_early: true }
    }
}

/// Kind of constraint a value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required field was absent or null.
    Required,
    /// A key not declared by the schema.
    NotAllowed,
    /// Value could not be converted to the declared kind.
    Type,
    /// String longer than the declared maximum.
    MaxLength,
    /// Number not positive.
    Positive,
    /// String is not a GUID.
    Guid,
}

/// A single constraint failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path of the offending field (`parent.child`, `list[2]`).
    pub field: String,
    /// What was violated.
    pub kind: ViolationKind,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    fn new(field: &str, kind: ViolationKind, detail: impl std::fmt::Display) -> Self {
        Self {
            field: field.to_string(),
            kind,
            message: format!("\"{}\" {}", field, detail),
        }
    }
}

/// A record was rejected by a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.details))]
pub struct ValidationError {
    /// Every violation found, in field order.
    pub details: Vec<Violation>,
}

impl ValidationError {
    /// Check if a given field has a violation.
    pub fn has_field(&self, field: &str) -> bool {
        self.details.iter().any(|v| v.field == field)
    }
}

fn join_messages(details: &[Violation]) -> String {
    details
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join(". ")
}

pub(super) fn validate_record(
    schema: &Schema,
    record: &Record,
    opts: ValidateOptions,
) -> Result<Record, ValidationError> {
    let mut violations = Vec::new();
    let validated = check_record(schema, record, "", opts, &mut violations);
    if violations.is_empty() {
        Ok(validated)
    } else {
        Err(ValidationError {
            details: violations,
        })
    }
}

fn check_record(
    schema: &Schema,
    record: &Record,
    prefix: &str,
    opts: ValidateOptions,
    violations: &mut Vec<Violation>,
) -> Record {
    let mut out = Record::new();

    for (name, field) in schema.fields() {
        if opts.abort_early && !violations.is_empty() {
            return out;
        }
        let path = join_path(prefix, name);
        match record.get(name) {
            None => {
                if let Some(default) = field.default_value() {
                    out.insert(name.to_string(), default.produce());
                } else if field.is_required() {
                    violations.push(Violation::new(&path, ViolationKind::Required, "is required"));
                }
            }
            Some(Value::Null) if field.is_required() => {
                violations.push(Violation::new(&path, ViolationKind::Required, "is required"));
            }
            Some(Value::Null) => {
                out.insert(name.to_string(), Value::Null);
            }
            Some(value) => match coerce(field, value, &path, opts, violations) {
                Ok(converted) => {
                    out.insert(name.to_string(), converted);
                }
                Err(violation) => violations.push(violation),
            },
        }
    }

    for (key, value) in record {
        if schema.contains(key) {
            continue;
        }
        if schema.allows_unknown() {
            out.insert(key.clone(), value.clone());
        } else {
            if opts.abort_early && !violations.is_empty() {
                break;
            }
            let path = join_path(prefix, key);
            violations.push(Violation::new(&path, ViolationKind::NotAllowed, "is not allowed"));
        }
    }

    out
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn coerce(
    field: &FieldType,
    value: &Value,
    path: &str,
    opts: ValidateOptions,
    violations: &mut Vec<Violation>,
) -> Result<Value, Violation> {
    match field.kind() {
        FieldKind::String | FieldKind::Uuid => coerce_string(field, value, path),
        FieldKind::Number | FieldKind::Float => coerce_number(field, value, path),
        FieldKind::Boolean => coerce_boolean(value, path),
        FieldKind::Date => coerce_date(value, path),
        FieldKind::Binary => match value {
            Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
            Value::String(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
            _ => Err(Violation::new(path, ViolationKind::Type, "must be a buffer or a string")),
        },
        FieldKind::Object => coerce_object(field, value, path, opts, violations),
        FieldKind::Array => coerce_array(field, value, path, opts, violations),
    }
}

fn coerce_string(field: &FieldType, value: &Value, path: &str) -> Result<Value, Violation> {
    let s = value
        .as_str()
        .ok_or_else(|| Violation::new(path, ViolationKind::Type, "must be a string"))?;

    if let Some(max) = field.max_length() {
        if s.chars().count() > max {
            return Err(Violation::new(
                path,
                ViolationKind::MaxLength,
                format_args!("length must be less than or equal to {} characters long", max),
            ));
        }
    }
    if field.is_guid() && uuid::Uuid::parse_str(s).is_err() {
        return Err(Violation::new(path, ViolationKind::Guid, "must be a valid GUID"));
    }

    Ok(Value::String(s.to_string()))
}

fn coerce_number(field: &FieldType, value: &Value, path: &str) -> Result<Value, Violation> {
    let not_a_number = || Violation::new(path, ViolationKind::Type, "must be a number");

    let number = match value {
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) if f.is_finite() => Value::Float(*f),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Value::Int(i)
            } else {
                match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => Value::Float(f),
                    _ => return Err(not_a_number()),
                }
            }
        }
        _ => return Err(not_a_number()),
    };

    let number = match (field.kind(), number) {
        (FieldKind::Float, Value::Int(i)) => Value::Float(i as f64),
        (_, n) => n,
    };
    let number = match (field.precision_digits(), number) {
        (Some(digits), Value::Float(f)) => Value::Float(round_to(f, digits)),
        (_, n) => n,
    };

    if field.is_positive() {
        let f = number.as_f64().unwrap_or(0.0);
        if f < 0.0 || (f == 0.0 && !field.allows_zero()) {
            return Err(Violation::new(
                path,
                ViolationKind::Positive,
                "must be a positive number",
            ));
        }
    }

    Ok(number)
}

fn round_to(f: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (f * scale).round() / scale
}

fn coerce_boolean(value: &Value, path: &str) -> Result<Value, Violation> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
        _ => Err(Violation::new(path, ViolationKind::Type, "must be a boolean")),
    }
}

fn coerce_date(value: &Value, path: &str) -> Result<Value, Violation> {
    let invalid = || Violation::new(path, ViolationKind::Type, "must be a valid date");

    let date = match value {
        Value::Date(d) => truncate_to_millis(*d),
        Value::Int(millis) => from_millis(*millis).ok_or_else(invalid)?,
        Value::Float(millis) if millis.is_finite() => {
            from_millis(*millis as i64).ok_or_else(invalid)?
        }
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(millis) => from_millis(millis).ok_or_else(invalid)?,
            Err(_) => DateTime::parse_from_rfc3339(s.trim())
                .map(|d| truncate_to_millis(d.with_timezone(&Utc)))
                .map_err(|_| invalid())?,
        },
        _ => return Err(invalid()),
    };

    Ok(Value::Date(date))
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

fn coerce_object(
    field: &FieldType,
    value: &Value,
    path: &str,
    opts: ValidateOptions,
    violations: &mut Vec<Violation>,
) -> Result<Value, Violation> {
    let not_an_object = || Violation::new(path, ViolationKind::Type, "must be of type object");

    let object = match parse_structured(value) {
        Some(serde_json::Value::Object(map)) => map,
        _ => return Err(not_an_object()),
    };

    let Some(keys) = field.keys() else {
        return Ok(Value::Json(serde_json::Value::Object(object)));
    };

    let nested: Record = object
        .into_iter()
        .map(|(k, v)| (k, Value::from_json(v)))
        .collect();
    let checked = check_record(keys, &nested, path, opts, violations);
    let map = checked.into_iter().map(|(k, v)| (k, v.to_json())).collect();
    Ok(Value::Json(serde_json::Value::Object(map)))
}

fn coerce_array(
    field: &FieldType,
    value: &Value,
    path: &str,
    opts: ValidateOptions,
    violations: &mut Vec<Violation>,
) -> Result<Value, Violation> {
    let not_an_array = || Violation::new(path, ViolationKind::Type, "must be an array");

    let items = match parse_structured(value) {
        Some(serde_json::Value::Array(items)) => items,
        _ => return Err(not_an_array()),
    };

    let Some(item_type) = field.items() else {
        return Ok(Value::Json(serde_json::Value::Array(items)));
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if opts.abort_early && !violations.is_empty() {
            break;
        }
        let item_path = format!("{}[{}]", path, i);
        let item = Value::from_json(item);
        if item.is_null() {
            if item_type.is_required() {
                violations.push(Violation::new(&item_path, ViolationKind::Required, "is required"));
            } else {
                out.push(serde_json::Value::Null);
            }
            continue;
        }
        match coerce(item_type, &item, &item_path, opts, violations) {
            Ok(converted) => out.push(converted.to_json()),
            Err(violation) => violations.push(violation),
        }
    }
    Ok(Value::Json(serde_json::Value::Array(out)))
}

fn parse_structured(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Json(json) => Some(json.clone()),
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    }
}
