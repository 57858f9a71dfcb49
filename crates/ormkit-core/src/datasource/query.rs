//! Statements and their outcomes.

use crate::value::{Record, Value};

/// A single-table statement with an equality filter.
///
/// ```
/// use ormkit_core::datasource::{Query, QueryOp};
/// use ormkit_core::record;
///
/// let q = Query::table("users").filter(record! { "name" => "ann" }).first();
/// assert_eq!(q.op, QueryOp::First);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Target table.
    pub table: String,
    /// Column equality predicates, all of which must hold.
    pub filter: Record,
    /// What to do with matching rows.
    pub op: QueryOp,
}

/// Statement kind.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    /// Select matching rows, optionally limited.
    Select {
        /// Maximum number of rows.
        limit: Option<usize>,
    },
    /// Select the first matching row.
    First,
    /// Count matching rows.
    Count,
    /// Insert a row. The filter is ignored.
    Insert(Record),
    /// Set columns on matching rows.
    Update(Record),
    /// Delete matching rows.
    Delete,
}

impl Query {
    /// Start a select over every row of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Record::new(),
            op: QueryOp::Select { limit: None },
        }
    }

    /// Restrict to rows matching every `column = value` pair.
    pub fn filter(mut self, filter: Record) -> Self {
        self.filter.extend(filter);
        self
    }

    /// Add a single `column = value` predicate.
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(column.into(), value.into());
        self
    }

    /// Select at most `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.op = QueryOp::Select { limit: Some(limit) };
        self
    }

    /// Select the first matching row.
    pub fn first(mut self) -> Self {
        self.op = QueryOp::First;
        self
    }

    /// Count matching rows.
    pub fn count(mut self) -> Self {
        self.op = QueryOp::Count;
        self
    }

    /// Insert `values` as a new row.
    pub fn insert(mut self, values: Record) -> Self {
        self.op = QueryOp::Insert(values);
        self
    }

    /// Set `values` on matching rows.
    pub fn update(mut self, values: Record) -> Self {
        self.op = QueryOp::Update(values);
        self
    }

    /// Delete matching rows.
    pub fn delete(mut self) -> Self {
        self.op = QueryOp::Delete;
        self
    }

    /// Check if the statement writes.
    pub fn is_write(&self) -> bool {
        matches!(
            self.op,
            QueryOp::Insert(_) | QueryOp::Update(_) | QueryOp::Delete
        )
    }

    /// Check if a row satisfies the filter. A null predicate matches a null
    /// or absent column.
    pub fn matches(&self, row: &Record) -> bool {
        self.filter.iter().all(|(column, expected)| match row.get(column) {
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
    }
}

/// Outcome of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Rows from a select.
    Rows(Vec<Record>),
    /// Row from a `first` select.
    Row(Option<Record>),
    /// An insert, with the storage-generated key if the engine has one.
    Inserted {
        /// Generated surrogate key.
        generated_key: Option<i64>,
    },
    /// Number of rows changed by an update or delete.
    Affected(u64),
    /// Result of a count.
    Count(u64),
}

impl QueryOutput {
    /// Take the rows, treating a single row as a one-element list.
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Row(row) => row.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Take the first row.
    pub fn into_row(self) -> Option<Record> {
        match self {
            QueryOutput::Rows(rows) => rows.into_iter().next(),
            QueryOutput::Row(row) => row,
            _ => None,
        }
    }

    /// The count, or the number of affected/returned rows.
    pub fn count(&self) -> u64 {
        match self {
            QueryOutput::Count(n) | QueryOutput::Affected(n) => *n,
            QueryOutput::Rows(rows) => rows.len() as u64,
            QueryOutput::Row(row) => u64::from(row.is_some()),
            QueryOutput::Inserted { .. } => 1,
        }
    }

    /// The generated key of an insert.
    pub fn generated_key(&self) -> Option<i64> {
        match self {
            QueryOutput::Inserted { generated_key } => *generated_key,
            _ => None,
        }
    }
}
