//! The catalogue of field types.
//!
//! Each constructor returns a fresh [`FieldType`] carrying the catalogue's
//! baseline constraints; chain further constraints onto it.

use super::field::FieldType;
use super::kind::FieldKind;
use super::fields::Schema;

/// Maximum length of a catalogue string.
pub const STRING_MAX_LENGTH: usize = 512;

/// Decimal precision of a catalogue float.
pub const FLOAT_PRECISION: u32 = 4;

/// A string of at most [`STRING_MAX_LENGTH`] characters.
pub fn string() -> FieldType {
    FieldType::new(FieldKind::String).max(STRING_MAX_LENGTH)
}

/// A non-negative number.
pub fn number() -> FieldType {
    FieldType::new(FieldKind::Number).positive().allow_zero()
}

/// A float rounded to [`FLOAT_PRECISION`] decimal places.
pub fn float() -> FieldType {
    FieldType::new(FieldKind::Float).precision(FLOAT_PRECISION)
}

/// A boolean.
pub fn boolean() -> FieldType {
    FieldType::new(FieldKind::Boolean)
}

/// A date.
pub fn date() -> FieldType {
    FieldType::new(FieldKind::Date)
}

/// Binary data.
pub fn binary() -> FieldType {
    FieldType::new(FieldKind::Binary)
}

/// A GUID string.
pub fn uuid() -> FieldType {
    FieldType::new(FieldKind::Uuid)
}

/// An object with any keys.
pub fn object() -> FieldType {
    FieldType::new(FieldKind::Object)
}

/// An array whose items match `items`.
pub fn array(items: FieldType) -> FieldType {
    FieldType::array(items)
}

/// An array of anything.
pub fn any_array() -> FieldType {
    FieldType::new(FieldKind::Array)
}

/// An object with declared keys, usable as a model schema.
pub fn schema<K: Into<String>>(fields: impl IntoIterator<Item = (K, FieldType)>) -> FieldType {
    FieldType::object(Schema::new(fields))
}
