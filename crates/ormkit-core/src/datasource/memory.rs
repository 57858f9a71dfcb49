//! In-process datasource.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as Gate, OwnedMutexGuard};
use tracing::debug;

use super::{ColumnKind, Datasource, DatasourceError, Query, QueryOp, QueryOutput, TableDef, Transaction};
use crate::value::{Record, Value};

/// A datasource that keeps every table in memory.
///
/// Cloning shares the underlying tables. A transaction holds the write gate
/// until it finishes and works on a private copy of the state, so other
/// statements wait for it rather than interleaving with it. The inspection
/// helpers ([`rows`](Self::rows), [`table_names`](Self::table_names)) skip
/// the gate and see committed state only.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatasource {
    state: Arc<Mutex<MemoryState>>,
    gate: Arc<Gate<()>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    migrations: Vec<String>,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    def: TableDef,
    rows: Vec<Record>,
    last_rowid: i64,
}

impl MemoryDatasource {
    /// Create an empty datasource.
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Names of every table.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().tables.keys().cloned().collect();
        names.sort();
        names
    }
}

impl MemoryState {
    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, DatasourceError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DatasourceError::UnknownTable(name.to_string()))
    }

    fn execute(&mut self, query: &Query) -> Result<QueryOutput, DatasourceError> {
        debug!(table = %query.table, op = ?query.op, "memory statement");
        let table = self.table_mut(&query.table)?;

        let output = match &query.op {
            QueryOp::Select { limit } => {
                let matching = table.rows.iter().filter(|row| query.matches(row)).cloned();
                let rows = match limit {
                    Some(n) => matching.take(*n).collect(),
                    None => matching.collect(),
                };
                QueryOutput::Rows(rows)
            }
            QueryOp::First => {
                QueryOutput::Row(table.rows.iter().find(|row| query.matches(row)).cloned())
            }
            QueryOp::Count => {
                QueryOutput::Count(table.rows.iter().filter(|row| query.matches(row)).count() as u64)
            }
            QueryOp::Insert(values) => {
                let key = table.insert(values)?;
                QueryOutput::Inserted {
                    generated_key: Some(key),
                }
            }
            QueryOp::Update(values) => {
                table.check_columns(values.keys())?;
                let mut affected = 0;
                for row in table.rows.iter_mut().filter(|row| query.matches(row)) {
                    for (column, value) in values {
                        row.insert(column.clone(), value.clone());
                    }
                    affected += 1;
                }
                QueryOutput::Affected(affected)
            }
            QueryOp::Delete => {
                let before = table.rows.len();
                table.rows.retain(|row| !query.matches(row));
                QueryOutput::Affected((before - table.rows.len()) as u64)
            }
        };
        Ok(output)
    }
}

impl MemoryTable {
    fn new(def: TableDef) -> Self {
        Self {
            def,
            rows: Vec::new(),
            last_rowid: 0,
        }
    }

    /// Tables declared without columns accept any key.
    fn check_columns<'a>(&self, keys: impl Iterator<Item = &'a String>) -> Result<(), DatasourceError> {
        if self.def.columns.is_empty() {
            return Ok(());
        }
        for key in keys {
            if self.def.get(key).is_none() {
                return Err(DatasourceError::UnknownColumn {
                    table: self.def.name.clone(),
                    column: key.clone(),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, values: &Record) -> Result<i64, DatasourceError> {
        self.check_columns(values.keys())?;

        let mut row = values.clone();
        let mut rowid = self.last_rowid + 1;

        for column in &self.def.columns {
            if column.kind == ColumnKind::Increments {
                match row.get(&column.name) {
                    Some(Value::Int(explicit)) => rowid = *explicit,
                    _ => {
                        row.insert(column.name.clone(), Value::Int(rowid));
                    }
                }
                continue;
            }
            if !row.contains_key(&column.name) {
                if let Some(default) = &column.default {
                    row.insert(column.name.clone(), default.clone());
                }
            }
            let missing = row.get(&column.name).map_or(true, Value::is_null);
            if missing && !column.nullable {
                return Err(DatasourceError::Constraint(format!(
                    "NOT NULL {}.{}",
                    self.def.name, column.name
                )));
            }
        }

        self.last_rowid = self.last_rowid.max(rowid);
        self.rows.push(row);
        Ok(rowid)
    }
}

#[async_trait]
impl Datasource for MemoryDatasource {
    async fn run(&self, query: &Query) -> Result<QueryOutput, DatasourceError> {
        let _gate = self.gate.lock().await;
        self.state.lock().execute(query)
    }

    async fn begin(&self) -> Result<Arc<dyn Transaction>, DatasourceError> {
        let gate = self.gate.clone().lock_owned().await;
        let working = self.state.lock().clone();
        debug!("memory transaction started");
        Ok(Arc::new(MemoryTransaction {
            shared: self.state.clone(),
            open: Mutex::new(Some(OpenTransaction {
                working,
                _gate: gate,
            })),
        }))
    }

    async fn create_table(&self, table: &TableDef) -> Result<(), DatasourceError> {
        let _gate = self.gate.lock().await;
        let mut state = self.state.lock();
        if state.tables.contains_key(&table.name) {
            return Err(DatasourceError::TableExists(table.name.clone()));
        }
        debug!(table = %table.name, columns = table.columns.len(), "creating table");
        state
            .tables
            .insert(table.name.clone(), MemoryTable::new(table.clone()));
        Ok(())
    }

    async fn drop_table(&self, name: &str) -> Result<(), DatasourceError> {
        let _gate = self.gate.lock().await;
        self.state.lock().tables.remove(name);
        Ok(())
    }

    async fn has_table(&self, name: &str) -> Result<bool, DatasourceError> {
        let _gate = self.gate.lock().await;
        Ok(self.state.lock().tables.contains_key(name))
    }

    async fn applied_migrations(&self) -> Result<Vec<String>, DatasourceError> {
        let _gate = self.gate.lock().await;
        Ok(self.state.lock().migrations.clone())
    }

    async fn record_migration(&self, name: &str) -> Result<(), DatasourceError> {
        let _gate = self.gate.lock().await;
        self.state.lock().migrations.push(name.to_string());
        Ok(())
    }

    async fn remove_migration(&self, name: &str) -> Result<(), DatasourceError> {
        let _gate = self.gate.lock().await;
        self.state.lock().migrations.retain(|m| m != name);
        Ok(())
    }
}

/// Nothing else writes while the gate is held, so committing swaps the
/// working copy in whole.
struct MemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    open: Mutex<Option<OpenTransaction>>,
}

struct OpenTransaction {
    working: MemoryState,
    _gate: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn finished() -> DatasourceError {
        DatasourceError::Transaction("transaction already finished".to_string())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn run(&self, query: &Query) -> Result<QueryOutput, DatasourceError> {
        let mut open = self.open.lock();
        open.as_mut()
            .ok_or_else(Self::finished)?
            .working
            .execute(query)
    }

    async fn commit(&self) -> Result<(), DatasourceError> {
        let open = self.open.lock().take().ok_or_else(Self::finished)?;
        *self.shared.lock() = open.working;
        debug!("memory transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DatasourceError> {
        self.open.lock().take().ok_or_else(Self::finished)?;
        debug!("memory transaction rolled back");
        Ok(())
    }
}
