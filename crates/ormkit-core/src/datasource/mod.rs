//! The datasource contract.
//!
//! Models never talk to a storage engine directly: every read and write is
//! expressed as a [`Query`] and handed to a [`Datasource`]. The contract is
//! deliberately small (equality filters, single-table statements) and
//! includes the bookkeeping primitives the migration controller needs.
//!
//! [`MemoryDatasource`] is the in-process implementation; the `ormkit-sqlite`
//! crate provides one over SQLite.

mod memory;
mod query;
mod table;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryDatasource;
pub use query::{Query, QueryOp, QueryOutput};
pub use table::{ColumnDef, ColumnKind, TableDef};

/// Errors reported by a datasource.
#[derive(Debug, Error)]
pub enum DatasourceError {
    /// The statement addressed a table that does not exist.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// `create_table` on a table that already exists.
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// The statement named a column the table does not have.
    #[error("table '{table}' has no column named '{column}'")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A row violated a column constraint.
    #[error("constraint failed: {0}")]
    Constraint(String),

    /// The transaction handle was used after commit or rollback.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Engine-level failure, carried as-is.
    #[error("{0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DatasourceError {
    /// Wrap an engine error.
    pub fn engine(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DatasourceError::Engine(Box::new(err))
    }
}

/// A storage backend shared by every model bound to it.
#[async_trait]
pub trait Datasource: Send + Sync {
    /// Execute a statement.
    async fn run(&self, query: &Query) -> Result<QueryOutput, DatasourceError>;

    /// Open an atomic scope.
    async fn begin(&self) -> Result<Arc<dyn Transaction>, DatasourceError>;

    /// Create a table.
    async fn create_table(&self, table: &TableDef) -> Result<(), DatasourceError>;

    /// Drop a table if it exists.
    async fn drop_table(&self, name: &str) -> Result<(), DatasourceError>;

    /// Check if a table exists.
    async fn has_table(&self, name: &str) -> Result<bool, DatasourceError>;

    /// Names of applied migrations, in application order.
    async fn applied_migrations(&self) -> Result<Vec<String>, DatasourceError>;

    /// Append a migration to the applied log.
    async fn record_migration(&self, name: &str) -> Result<(), DatasourceError>;

    /// Remove a migration from the applied log.
    async fn remove_migration(&self, name: &str) -> Result<(), DatasourceError>;
}

/// An open atomic scope on a datasource.
///
/// Statements run through the handle are only visible to other callers after
/// [`commit`](Transaction::commit). A handle is finished once committed or
/// rolled back; further use fails with [`DatasourceError::Transaction`].
///
/// While a transaction is open, statements run on the datasource itself
/// wait for it to finish; they never join it.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Execute a statement inside the transaction.
    async fn run(&self, query: &Query) -> Result<QueryOutput, DatasourceError>;

    /// Make the transaction's writes durable.
    async fn commit(&self) -> Result<(), DatasourceError>;

    /// Discard the transaction's writes.
    async fn rollback(&self) -> Result<(), DatasourceError>;
}
