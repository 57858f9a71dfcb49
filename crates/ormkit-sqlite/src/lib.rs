//! ormkit SQLite datasource.
//!
//! Implements the [`ormkit_core::Datasource`] contract over a single
//! `rusqlite` connection: statements, DDL from [`ormkit_core::TableDef`],
//! transactions, and the applied-migration log.

pub mod config;
mod convert;
pub mod datasource;
mod statement;

pub use config::SqliteConfig;
pub use datasource::{SqliteDatasource, SqliteTransaction};
