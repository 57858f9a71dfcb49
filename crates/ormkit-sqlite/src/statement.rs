//! Rendering and executing statements.

use rusqlite::{params_from_iter, Connection, ErrorCode};
use tracing::debug;

use ormkit_core::{
    ColumnDef, ColumnKind, DatasourceError, Query, QueryOp, QueryOutput, Record, TableDef, Value,
};

use crate::convert::{self, from_sql, ident, Param};

/// A rendered statement with its bound values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement<'q> {
    pub sql: String,
    pub params: Vec<&'q Value>,
}

impl<'q> Statement<'q> {
    /// Render `query` as SQL.
    pub(crate) fn render(query: &'q Query) -> Self {
        let table = ident(&query.table);
        let mut params = Vec::new();
        let where_clause = render_filter(&query.filter, &mut params);

        let sql = match &query.op {
            QueryOp::Select { limit } => {
                let mut sql = format!("SELECT * FROM {}{}", table, where_clause);
                if let Some(n) = limit {
                    sql.push_str(&format!(" LIMIT {}", n));
                }
                sql
            }
            QueryOp::First => format!("SELECT * FROM {}{} LIMIT 1", table, where_clause),
            QueryOp::Count => format!("SELECT COUNT(*) FROM {}{}", table, where_clause),
            QueryOp::Insert(values) if values.is_empty() => {
                format!("INSERT INTO {} DEFAULT VALUES", table)
            }
            QueryOp::Insert(values) => {
                let columns: Vec<String> = values.keys().map(|c| ident(c)).collect();
                let placeholders = vec!["?"; values.len()].join(", ");
                params = values.values().collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    columns.join(", "),
                    placeholders
                )
            }
            QueryOp::Update(values) => {
                let mut set_params: Vec<&Value> = values.values().collect();
                let assignments: Vec<String> =
                    values.keys().map(|c| format!("{} = ?", ident(c))).collect();
                set_params.append(&mut params);
                params = set_params;
                format!("UPDATE {} SET {}{}", table, assignments.join(", "), where_clause)
            }
            QueryOp::Delete => format!("DELETE FROM {}{}", table, where_clause),
        };

        Self { sql, params }
    }
}

fn render_filter<'q>(filter: &'q Record, params: &mut Vec<&'q Value>) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let predicates: Vec<String> = filter
        .iter()
        .map(|(column, value)| {
            if value.is_null() {
                format!("{} IS NULL", ident(column))
            } else {
                params.push(value);
                format!("{} = ?", ident(column))
            }
        })
        .collect();
    format!(" WHERE {}", predicates.join(" AND "))
}

fn column_sql(column: &ColumnDef) -> String {
    let ty = match column.kind {
        ColumnKind::Increments => {
            return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", ident(&column.name));
        }
        ColumnKind::Uuid => "CHAR(36)",
        ColumnKind::String => "VARCHAR(255)",
        ColumnKind::Text | ColumnKind::Json => "TEXT",
        ColumnKind::Integer | ColumnKind::Boolean | ColumnKind::Date => "INTEGER",
        ColumnKind::Float => "REAL",
        ColumnKind::Binary => "BLOB",
    };

    let mut sql = format!("{} {}", ident(&column.name), ty);
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&convert::literal(default));
    }
    sql
}

/// Render `CREATE TABLE` for a definition.
pub(crate) fn create_table_sql(table: &TableDef) -> String {
    let mut parts: Vec<String> = table.columns.iter().map(column_sql).collect();

    let has_increments = table.increments_column().is_some();
    let primary: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.primary && c.kind != ColumnKind::Increments)
        .map(|c| ident(&c.name))
        .collect();
    if !primary.is_empty() {
        // An increments column is already the rowid key.
        let constraint = if has_increments { "UNIQUE" } else { "PRIMARY KEY" };
        parts.push(format!("{} ({})", constraint, primary.join(", ")));
    }

    format!("CREATE TABLE {} ({})", ident(&table.name), parts.join(", "))
}

/// Run `query` on `conn`.
pub(crate) fn execute(conn: &Connection, query: &Query) -> Result<QueryOutput, DatasourceError> {
    let statement = Statement::render(query);
    debug!(sql = %statement.sql, params = statement.params.len(), "sqlite statement");

    let params = params_from_iter(statement.params.iter().map(|v| Param(*v)));
    match &query.op {
        QueryOp::Select { .. } | QueryOp::First => {
            select(conn, &query.table, &statement.sql, params).map(|rows| match query.op {
                QueryOp::First => QueryOutput::Row(rows.into_iter().next()),
                _ => QueryOutput::Rows(rows),
            })
        }
        QueryOp::Count => conn
            .query_row(&statement.sql, params, |row| row.get::<_, i64>(0))
            .map_err(|err| map_error(err, &query.table))
            .map(|n| QueryOutput::Count(n.max(0) as u64)),
        QueryOp::Insert(_) => conn
            .execute(&statement.sql, params)
            .map_err(|err| map_error(err, &query.table))
            .map(|_| QueryOutput::Inserted {
                generated_key: Some(conn.last_insert_rowid()),
            }),
        QueryOp::Update(values) if values.is_empty() => Ok(QueryOutput::Affected(0)),
        QueryOp::Update(_) | QueryOp::Delete => conn
            .execute(&statement.sql, params)
            .map_err(|err| map_error(err, &query.table))
            .map(|n| QueryOutput::Affected(n as u64)),
    }
}

fn select<P: rusqlite::Params>(
    conn: &Connection,
    table: &str,
    sql: &str,
    params: P,
) -> Result<Vec<Record>, DatasourceError> {
    let mut stmt = conn.prepare(sql).map_err(|err| map_error(err, table))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut rows = stmt.query(params).map_err(|err| map_error(err, table))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(DatasourceError::engine)? {
        let mut record = Record::new();
        for (i, column) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(DatasourceError::engine)?;
            record.insert(column.clone(), from_sql(value)?);
        }
        out.push(record);
    }
    Ok(out)
}

/// Translate an engine error into a datasource error.
pub(crate) fn map_error(err: rusqlite::Error, table: &str) -> DatasourceError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if message.starts_with("no such table") {
            return DatasourceError::UnknownTable(table.to_string());
        }
        if let Some(column) = message
            .strip_prefix("no such column: ")
            .or_else(|| message.split(" has no column named ").nth(1))
        {
            return DatasourceError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            };
        }
        if message.contains("already exists") {
            return DatasourceError::TableExists(table.to_string());
        }
        if failure.code == ErrorCode::ConstraintViolation {
            return DatasourceError::Constraint(message.clone());
        }
    }
    DatasourceError::engine(err)
}
