//! Field type descriptors.

use std::sync::Arc;

use super::kind::FieldKind;
use super::fields::Schema;
use crate::error::ConfigError;
use crate::value::Value;

/// Default value for a field that is absent at validation time.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value.
    Static(Value),
    /// A producer evaluated each time a default is needed.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the default value.
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Producer(f) => f(),
        }
    }
}

impl std::fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// A declared field type: a kind plus its constraints.
///
/// Constraint methods consume and return the type, so declarations read as
/// chains: `types::string().max(64).required()`.
#[derive(Debug, Clone)]
pub struct FieldType {
    kind: FieldKind,
    required: bool,
    default: Option<DefaultValue>,
    max: Option<usize>,
    positive: bool,
    allow_zero: bool,
    precision: Option<u32>,
    guid: bool,
    keys: Option<Schema>,
    items: Option<Box<FieldType>>,
}

impl FieldType {
    /// Create an unconstrained, optional field of the given kind.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            max: None,
            positive: false,
            allow_zero: false,
            precision: None,
            guid: kind == FieldKind::Uuid,
            keys: None,
            items: None,
        }
    }

    /// Create an object field with declared keys.
    pub fn object(keys: Schema) -> Self {
        let mut field = Self::new(FieldKind::Object);
        field.keys = Some(keys);
        field
    }

    /// Create an array field whose items must match `items`.
    pub fn array(items: FieldType) -> Self {
        let mut field = Self::new(FieldKind::Array);
        field.items = Some(Box::new(items));
        field
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Use a fixed default when the field is absent.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Use a producer for the default when the field is absent.
    pub fn default_with(mut self, producer: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    /// Limit string length (in characters).
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Require numbers to be strictly positive.
    pub fn positive(mut self) -> Self {
        self.positive = true;
        self
    }

    /// Accept zero even when [`positive`](Self::positive) is set.
    pub fn allow_zero(mut self) -> Self {
        self.allow_zero = true;
        self
    }

    /// Round numbers to at most `digits` decimal places.
    pub fn precision(mut self, digits: u32) -> Self {
        self.precision = Some(digits);
        self
    }

    /// Require strings to be valid GUIDs.
    pub fn guid(mut self) -> Self {
        self.guid = true;
        self
    }

    /// Allow or reject undeclared keys on an object field.
    pub fn unknown(mut self, allow: bool) -> Self {
        if let Some(keys) = self.keys.take() {
            self.keys = Some(keys.unknown(allow));
        }
        self
    }

    /// The field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether the field must be present.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The default, if any.
    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Maximum string length, if any.
    pub fn max_length(&self) -> Option<usize> {
        self.max
    }

    /// Whether numbers must be positive.
    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// Whether zero is accepted alongside positive numbers.
    pub fn allows_zero(&self) -> bool {
        self.allow_zero
    }

    /// Decimal precision, if any.
    pub fn precision_digits(&self) -> Option<u32> {
        self.precision
    }

    /// Whether strings must be GUIDs.
    pub fn is_guid(&self) -> bool {
        self.guid
    }

    /// Declared keys of an object field.
    pub fn keys(&self) -> Option<&Schema> {
        self.keys.as_ref()
    }

    /// Item type of an array field.
    pub fn items(&self) -> Option<&FieldType> {
        self.items.as_deref()
    }

    /// Use this object type as a model schema.
    ///
    /// Fails unless the type is an object with declared keys.
    pub fn into_schema(self) -> Result<Schema, ConfigError> {
        match (self.kind, self.keys) {
            (FieldKind::Object, Some(keys)) => Ok(keys),
            (kind, _) => Err(ConfigError::NotASchema {
                kind: kind.to_string(),
            }),
        }
    }
}

impl From<Schema> for FieldType {
    fn from(schema: Schema) -> Self {
        FieldType::object(schema)
    }
}
