//! Table definitions for DDL.

use crate::schema::{FieldKind, Schema};
use crate::value::Value;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Auto-incrementing integer primary key.
    Increments,
    /// UUID text.
    Uuid,
    /// Bounded text.
    String,
    /// Unbounded text.
    Text,
    /// 64-bit integer.
    Integer,
    /// Floating point.
    Float,
    /// Boolean, stored as `0`/`1`.
    Boolean,
    /// Date, stored as epoch milliseconds.
    Date,
    /// Binary blob.
    Binary,
    /// JSON text.
    Json,
}

impl ColumnKind {
    /// The column kind that stores a schema field kind.
    pub fn for_field(kind: FieldKind) -> Self {
        match kind {
            FieldKind::String => ColumnKind::String,
            FieldKind::Number => ColumnKind::Integer,
            FieldKind::Float => ColumnKind::Float,
            FieldKind::Boolean => ColumnKind::Boolean,
            FieldKind::Date => ColumnKind::Date,
            FieldKind::Binary => ColumnKind::Binary,
            FieldKind::Uuid => ColumnKind::Uuid,
            FieldKind::Object | FieldKind::Array => ColumnKind::Json,
        }
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub kind: ColumnKind,
    /// Whether the column accepts null.
    pub nullable: bool,
    /// Whether the column is (part of) the primary key.
    pub primary: bool,
    /// Value used when an insert omits the column.
    pub default: Option<Value>,
}

impl ColumnDef {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: kind != ColumnKind::Increments,
            primary: kind == ColumnKind::Increments,
            default: None,
        }
    }

    /// Reject null values.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark as primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    /// Set the default value.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns, in order.
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Create an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Derive a table from a schema, one column per field.
    ///
    /// An `id` field becomes the primary key unless a numeric `_id`
    /// surrogate is present, in which case `_id` auto-increments.
    pub fn for_schema(name: impl Into<String>, schema: &Schema) -> Self {
        let surrogate = schema.kind_of("_id") == Some(FieldKind::Number);
        let mut table = Self::new(name);
        for (field, ty) in schema.fields() {
            let column = match field {
                "_id" if surrogate => ColumnDef::new(field, ColumnKind::Increments),
                "id" if !surrogate => {
                    ColumnDef::new(field, ColumnKind::for_field(ty.kind())).primary()
                }
                _ => ColumnDef::new(field, ColumnKind::for_field(ty.kind())),
            };
            table = table.column(column);
        }
        table
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Add an auto-incrementing primary key.
    pub fn increments(self, name: impl Into<String>) -> Self {
        self.column(ColumnDef::new(name, ColumnKind::Increments))
    }

    /// Add a nullable UUID column.
    pub fn uuid(self, name: impl Into<String>) -> Self {
        self.column(ColumnDef::new(name, ColumnKind::Uuid))
    }

    /// Add a nullable string column.
    pub fn string(self, name: impl Into<String>) -> Self {
        self.column(ColumnDef::new(name, ColumnKind::String))
    }

    /// Add a nullable integer column.
    pub fn integer(self, name: impl Into<String>) -> Self {
        self.column(ColumnDef::new(name, ColumnKind::Integer))
    }

    /// Add a nullable boolean column.
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.column(ColumnDef::new(name, ColumnKind::Boolean))
    }

    /// Add a nullable date column.
    pub fn date(self, name: impl Into<String>) -> Self {
        self.column(ColumnDef::new(name, ColumnKind::Date))
    }

    /// Get a column by name.
    pub fn get(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The auto-incrementing column, if any.
    pub fn increments_column(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Increments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types;

    #[test]
    fn test_table_builder() {
        let table = TableDef::new("things")
            .increments("_id")
            .uuid("id")
            .column(ColumnDef::new("name", ColumnKind::String).not_null().default("x"));

        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.increments_column().unwrap().name, "_id");
        let name = table.get("name").unwrap();
        assert!(!name.nullable);
        assert_eq!(name.default, Some(Value::from("x")));
    }

    #[test]
    fn test_for_schema() {
        let schema = Schema::new([
            ("id", types::uuid()),
            ("flag", types::boolean()),
            ("meta", types::object()),
        ]);
        let table = TableDef::for_schema("plain", &schema);
        assert!(table.get("id").unwrap().primary);
        assert_eq!(table.get("flag").unwrap().kind, ColumnKind::Boolean);
        assert_eq!(table.get("meta").unwrap().kind, ColumnKind::Json);

        let phantom = schema.extend([("_id", types::number())]);
        let table = TableDef::for_schema("phantom", &phantom);
        assert_eq!(table.increments_column().unwrap().name, "_id");
        assert!(!table.get("id").unwrap().primary);
    }
}
