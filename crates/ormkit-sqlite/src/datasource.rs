//! The SQLite datasource.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use ormkit_core::{Datasource, DatasourceError, Query, QueryOutput, TableDef, Transaction};

use crate::config::SqliteConfig;
use crate::convert::ident;
use crate::statement::{self, map_error};

/// A datasource over one SQLite connection.
///
/// Clones share the connection. Statements run on the calling task while
/// the connection lock is held. A transaction keeps the lock until it
/// finishes, so statements from other callers queue behind it.
#[derive(Clone)]
pub struct SqliteDatasource {
    conn: Arc<AsyncMutex<Connection>>,
    config: Arc<SqliteConfig>,
}

impl SqliteDatasource {
    /// Open a database.
    pub fn open(config: SqliteConfig) -> Result<Self, DatasourceError> {
        let conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(DatasourceError::engine)?;

        conn.busy_timeout(config.busy_timeout)
            .map_err(DatasourceError::engine)?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)
            .map_err(DatasourceError::engine)?;

        info!(
            path = ?config.path,
            foreign_keys = config.foreign_keys,
            "opened sqlite datasource"
        );

        Ok(Self {
            conn: Arc::new(AsyncMutex::new(conn)),
            config: Arc::new(config),
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, DatasourceError> {
        Self::open(SqliteConfig::in_memory())
    }

    /// The configuration this datasource was opened with.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run raw SQL, for migrations that need more than [`TableDef`].
    pub async fn execute_batch(&self, sql: &str) -> Result<(), DatasourceError> {
        debug!(sql = %sql, "sqlite batch");
        self.conn
            .lock()
            .await
            .execute_batch(sql)
            .map_err(DatasourceError::engine)
    }

    fn ensure_log(&self, conn: &Connection) -> Result<(), DatasourceError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" VARCHAR(255) NOT NULL UNIQUE, \
             \"applied_at\" INTEGER NOT NULL)",
            ident(&self.config.migrations_table)
        );
        conn.execute_batch(&sql).map_err(DatasourceError::engine)
    }
}

impl std::fmt::Debug for SqliteDatasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatasource")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl Datasource for SqliteDatasource {
    async fn run(&self, query: &Query) -> Result<QueryOutput, DatasourceError> {
        let conn = self.conn.lock().await;
        statement::execute(&conn, query)
    }

    async fn begin(&self) -> Result<Arc<dyn Transaction>, DatasourceError> {
        let conn = self.conn.clone().lock_owned().await;
        conn.execute_batch("BEGIN")
            .map_err(|err| DatasourceError::Transaction(err.to_string()))?;
        debug!("sqlite transaction started");
        Ok(Arc::new(SqliteTransaction {
            conn: Mutex::new(Some(conn)),
        }))
    }

    async fn create_table(&self, table: &TableDef) -> Result<(), DatasourceError> {
        if table.columns.is_empty() {
            return Err(DatasourceError::Constraint(format!(
                "table '{}' needs at least one column",
                table.name
            )));
        }
        let sql = statement::create_table_sql(table);
        debug!(sql = %sql, "sqlite create table");
        self.conn
            .lock()
            .await
            .execute_batch(&sql)
            .map_err(|err| map_error(err, &table.name))
    }

    async fn drop_table(&self, name: &str) -> Result<(), DatasourceError> {
        let sql = format!("DROP TABLE IF EXISTS {}", ident(name));
        self.conn
            .lock()
            .await
            .execute_batch(&sql)
            .map_err(|err| map_error(err, name))
    }

    async fn has_table(&self, name: &str) -> Result<bool, DatasourceError> {
        self.conn
            .lock()
            .await
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(DatasourceError::engine)
    }

    async fn applied_migrations(&self) -> Result<Vec<String>, DatasourceError> {
        let conn = self.conn.lock().await;
        self.ensure_log(&conn)?;
        let sql = format!(
            "SELECT \"name\" FROM {} ORDER BY \"id\"",
            ident(&self.config.migrations_table)
        );
        let mut stmt = conn.prepare(&sql).map_err(DatasourceError::engine)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(DatasourceError::engine)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatasourceError::engine)?;
        Ok(names)
    }

    async fn record_migration(&self, name: &str) -> Result<(), DatasourceError> {
        let conn = self.conn.lock().await;
        self.ensure_log(&conn)?;
        let sql = format!(
            "INSERT INTO {} (\"name\", \"applied_at\") VALUES (?1, ?2)",
            ident(&self.config.migrations_table)
        );
        conn.execute(&sql, params![name, Utc::now().timestamp_millis()])
            .map_err(|err| map_error(err, &self.config.migrations_table))?;
        Ok(())
    }

    async fn remove_migration(&self, name: &str) -> Result<(), DatasourceError> {
        let conn = self.conn.lock().await;
        self.ensure_log(&conn)?;
        let sql = format!(
            "DELETE FROM {} WHERE \"name\" = ?1",
            ident(&self.config.migrations_table)
        );
        conn.execute(&sql, params![name])
            .map_err(|err| map_error(err, &self.config.migrations_table))?;
        Ok(())
    }
}

/// A transaction holding the shared connection.
///
/// Dropping an unfinished transaction rolls it back and releases the
/// connection.
pub struct SqliteTransaction {
    conn: Mutex<Option<OwnedMutexGuard<Connection>>>,
}

impl SqliteTransaction {
    fn finished() -> DatasourceError {
        DatasourceError::Transaction("transaction already finished".to_string())
    }

    fn finish(&self, sql: &str) -> Result<(), DatasourceError> {
        let conn = self.conn.lock().take().ok_or_else(Self::finished)?;
        conn.execute_batch(sql)
            .map_err(|err| DatasourceError::Transaction(err.to_string()))
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn run(&self, query: &Query) -> Result<QueryOutput, DatasourceError> {
        let conn = self.conn.lock();
        statement::execute(conn.as_ref().ok_or_else(Self::finished)?, query)
    }

    async fn commit(&self) -> Result<(), DatasourceError> {
        self.finish("COMMIT")?;
        debug!("sqlite transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DatasourceError> {
        self.finish("ROLLBACK")?;
        debug!("sqlite transaction rolled back");
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "failed to roll back abandoned transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::{record, ColumnDef, ColumnKind, Value};
    use pretty_assertions::assert_eq;

    async fn setup() -> SqliteDatasource {
        let ds = SqliteDatasource::in_memory().unwrap();
        ds.create_table(
            &TableDef::new("items")
                .increments("_id")
                .string("name")
                .column(ColumnDef::new("qty", ColumnKind::Integer).not_null().default(0)),
        )
        .await
        .unwrap();
        ds
    }

    #[tokio::test]
    async fn test_insert_and_select() {
        let ds = setup().await;
        let out = ds
            .run(&Query::table("items").insert(record! { "name" => "bolt" }))
            .await
            .unwrap();
        assert_eq!(out.generated_key(), Some(1));

        let row = ds
            .run(&Query::table("items").where_eq("name", "bolt").first())
            .await
            .unwrap()
            .into_row()
            .unwrap();
        assert_eq!(row, record! { "_id" => 1, "name" => "bolt", "qty" => 0 });

        let missing = ds
            .run(&Query::table("items").where_eq("name", "nut").first())
            .await
            .unwrap();
        assert_eq!(missing, QueryOutput::Row(None));
    }

    #[tokio::test]
    async fn test_update_delete_count() {
        let ds = setup().await;
        for name in ["a", "b", "c"] {
            ds.run(&Query::table("items").insert(record! { "name" => name }))
                .await
                .unwrap();
        }

        let updated = ds
            .run(&Query::table("items").where_eq("name", "b").update(record! { "qty" => 4 }))
            .await
            .unwrap();
        assert_eq!(updated, QueryOutput::Affected(1));

        let deleted = ds
            .run(&Query::table("items").where_eq("qty", 0).delete())
            .await
            .unwrap();
        assert_eq!(deleted, QueryOutput::Affected(2));

        let count = ds.run(&Query::table("items").count()).await.unwrap();
        assert_eq!(count, QueryOutput::Count(1));
    }

    #[tokio::test]
    async fn test_null_filter() {
        let ds = setup().await;
        ds.run(&Query::table("items").insert(record! { "qty" => 1 }))
            .await
            .unwrap();
        let rows = ds
            .run(&Query::table("items").where_eq("name", Value::Null))
            .await
            .unwrap()
            .into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::Null);
    }

    #[tokio::test]
    async fn test_errors() {
        let ds = setup().await;

        let err = ds.run(&Query::table("ghost").count()).await.unwrap_err();
        assert!(matches!(err, DatasourceError::UnknownTable(ref t) if t == "ghost"));

        let err = ds
            .run(&Query::table("items").insert(record! { "colour" => "red" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DatasourceError::UnknownColumn { ref column, .. } if column == "colour"));

        let err = ds
            .run(&Query::table("items").insert(record! { "qty" => Value::Null }))
            .await
            .unwrap_err();
        assert!(matches!(err, DatasourceError::Constraint(_)));

        let err = ds.create_table(&TableDef::new("items").string("x")).await.unwrap_err();
        assert!(matches!(err, DatasourceError::TableExists(ref t) if t == "items"));

        let err = ds.create_table(&TableDef::new("empty")).await.unwrap_err();
        assert!(matches!(err, DatasourceError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let ds = setup().await;

        let tx = ds.begin().await.unwrap();
        tx.run(&Query::table("items").insert(record! { "name" => "kept" }))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(DatasourceError::Transaction(_))
        ));

        let tx = ds.begin().await.unwrap();
        tx.run(&Query::table("items").insert(record! { "name" => "lost" }))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        {
            let tx = ds.begin().await.unwrap();
            tx.run(&Query::table("items").insert(record! { "name" => "dropped" }))
                .await
                .unwrap();
        }

        let names: Vec<Value> = ds
            .run(&Query::table("items"))
            .await
            .unwrap()
            .into_rows()
            .into_iter()
            .map(|row| row["name"].clone())
            .collect();
        assert_eq!(names, vec![Value::from("kept")]);
    }

    #[tokio::test]
    async fn test_migration_log() {
        let ds = SqliteDatasource::open(SqliteConfig::in_memory().with_migrations_table("log"))
            .unwrap();
        assert!(ds.applied_migrations().await.unwrap().is_empty());

        ds.record_migration("001").await.unwrap();
        ds.record_migration("002").await.unwrap();
        assert_eq!(ds.applied_migrations().await.unwrap(), vec!["001", "002"]);
        assert!(ds.has_table("log").await.unwrap());

        ds.remove_migration("002").await.unwrap();
        assert_eq!(ds.applied_migrations().await.unwrap(), vec!["001"]);

        assert!(matches!(
            ds.record_migration("001").await,
            Err(DatasourceError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn test_drop_and_has_table() {
        let ds = setup().await;
        assert!(ds.has_table("items").await.unwrap());
        ds.drop_table("items").await.unwrap();
        ds.drop_table("items").await.unwrap();
        assert!(!ds.has_table("items").await.unwrap());
    }
}
