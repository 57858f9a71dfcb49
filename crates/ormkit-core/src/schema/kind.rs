//! Field kinds.

use serde::Serialize;

/// The declared kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// UTF-8 string.
    String,
    /// Integer or floating point number.
    Number,
    /// Floating point number with bounded precision.
    Float,
    /// Boolean value.
    Boolean,
    /// Point in time.
    Date,
    /// Binary data.
    Binary,
    /// UUID in canonical text form.
    Uuid,
    /// Structured object, stored as JSON text.
    Object,
    /// Structured array, stored as JSON text.
    Array,
}

impl FieldKind {
    /// Check if values of this kind are numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Number | FieldKind::Float)
    }

    /// Check if values of this kind are stored as JSON text.
    pub fn is_structured(&self) -> bool {
        matches!(self, FieldKind::Object | FieldKind::Array)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::String => write!(f, "string"),
            FieldKind::Number => write!(f, "number"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Boolean => write!(f, "boolean"),
            FieldKind::Date => write!(f, "date"),
            FieldKind::Binary => write!(f, "binary"),
            FieldKind::Uuid => write!(f, "uuid"),
            FieldKind::Object => write!(f, "object"),
            FieldKind::Array => write!(f, "array"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_checks() {
        assert!(FieldKind::Number.is_numeric());
        assert!(FieldKind::Float.is_numeric());
        assert!(!FieldKind::String.is_numeric());

        assert!(FieldKind::Object.is_structured());
        assert!(FieldKind::Array.is_structured());
        assert!(!FieldKind::Date.is_structured());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(FieldKind::Uuid.to_string(), "uuid");
        assert_eq!(
            serde_json::to_value(FieldKind::Boolean).unwrap(),
            serde_json::json!("boolean")
        );
    }
}
