//! Field schemas and the validatable type catalogue.
//!
//! A [`Schema`] is a closed, ordered set of named [`FieldType`]s. Models
//! validate and default their records against it before every write, and the
//! codec reads its field kinds to decide how values are stored.
//!
//! # Example
//!
//! ```
//! use ormkit_core::schema::{types, ValidateOptions};
//! use ormkit_core::record;
//!
//! let schema = types::schema([
//!     ("id", types::uuid()),
//!     ("foo", types::string().required()),
//!     ("bar", types::string().default("baz")),
//! ])
//! .into_schema()
//! .unwrap();
//!
//! let validated = schema
//!     .validate(&record! { "foo" => "x" }, ValidateOptions::default())
//!     .unwrap();
//! assert_eq!(validated["bar"].as_str(), Some("baz"));
//! ```

mod field;
mod kind;
#[allow(clippy::module_inception)]
mod fields;
pub mod types;
mod validate;

pub use field::{DefaultValue, FieldType};
pub use kind::FieldKind;
pub use fields::{FieldDescription, Schema, SchemaDescription};
pub use validate::{ValidateOptions, ValidationError, Violation, ViolationKind};
