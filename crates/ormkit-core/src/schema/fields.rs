//! Closed object schemas.

use std::sync::Arc;

use serde::Serialize;

use super::field::FieldType;
use super::kind::FieldKind;
use super::validate::{self, ValidateOptions, ValidationError};
use crate::value::Record;

/// An ordered, closed set of named field types.
///
/// Schemas are immutable: [`extend`](Schema::extend) returns a new schema and
/// leaves the receiver untouched. Cloning is cheap and clones share identity
/// (see [`is_same`](Schema::is_same)).
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Arc<Vec<(String, FieldType)>>,
    allow_unknown: bool,
}

impl Schema {
    /// Create a schema from `(name, type)` pairs, in declaration order.
    pub fn new<K: Into<String>>(fields: impl IntoIterator<Item = (K, FieldType)>) -> Self {
        let mut ordered: Vec<(String, FieldType)> = Vec::new();
        for (name, field) in fields {
            upsert_field(&mut ordered, name.into(), field);
        }
        Self {
            fields: Arc::new(ordered),
            allow_unknown: false,
        }
    }

    /// Allow or reject undeclared keys.
    pub fn unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    /// Whether undeclared keys are accepted.
    pub fn allows_unknown(&self) -> bool {
        self.allow_unknown
    }

    /// A new schema with `fields` merged in.
    ///
    /// Keys already present keep their position and take the new type.
    pub fn extend<K: Into<String>>(&self, fields: impl IntoIterator<Item = (K, FieldType)>) -> Self {
        let mut merged = self.fields.as_ref().clone();
        for (name, field) in fields {
            upsert_field(&mut merged, name.into(), field);
        }
        Self {
            fields: Arc::new(merged),
            allow_unknown: self.allow_unknown,
        }
    }

    /// Get a field type by name.
    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Get the kind of a field by name.
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(FieldType::kind)
    }

    /// Check if a field is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Declared field names, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Declared fields, in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check if two handles refer to the same schema object.
    pub fn is_same(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields) && self.allow_unknown == other.allow_unknown
    }

    /// Describe the schema's fields and constraints.
    pub fn describe(&self) -> SchemaDescription {
        SchemaDescription {
            keys: self
                .fields
                .iter()
                .map(|(name, field)| (name.clone(), FieldDescription::of(field)))
                .collect(),
            allow_unknown: self.allow_unknown,
        }
    }

    /// Validate a record, returning it with conversions and defaults applied.
    pub fn validate(&self, record: &Record, opts: ValidateOptions) -> Result<Record, ValidationError> {
        validate::validate_record(self, record, opts)
    }
}

fn upsert_field(fields: &mut Vec<(String, FieldType)>, name: String, field: FieldType) {
    match fields.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = field,
        None => fields.push((name, field)),
    }
}

/// Serializable description of a schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDescription {
    /// Field descriptions, in declaration order.
    pub keys: Vec<(String, FieldDescription)>,
    /// Whether undeclared keys are accepted.
    pub allow_unknown: bool,
}

impl SchemaDescription {
    /// Get a field description by name.
    pub fn get(&self, name: &str) -> Option<&FieldDescription> {
        self.keys.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }
}

/// Serializable description of a field type.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescription {
    /// Field kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether the field is required.
    pub required: bool,
    /// Whether the field has a default.
    pub has_default: bool,
    /// Maximum string length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    /// Decimal precision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Whether numbers must be positive.
    pub positive: bool,
    /// Whether zero is allowed for positive numbers.
    pub allow_zero: bool,
    /// Whether strings must be GUIDs.
    pub guid: bool,
    /// Nested keys of an object field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<SchemaDescription>,
    /// Item type of an array field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDescription>>,
}

impl FieldDescription {
    fn of(field: &FieldType) -> Self {
        Self {
            kind: field.kind(),
            required: field.is_required(),
            has_default: field.default_value().is_some(),
            max: field.max_length(),
            precision: field.precision_digits(),
            positive: field.is_positive(),
            allow_zero: field.allows_zero(),
            guid: field.is_guid(),
            keys: field.keys().map(Schema::describe),
            items: field.items().map(|items| Box::new(FieldDescription::of(items))),
        }
    }
}
