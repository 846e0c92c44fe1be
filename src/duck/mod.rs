//! Process-wide DuckDB handle.
//!
//! Every operation locks the single connection, runs exactly one logical
//! unit of work against it and releases the lock when the guard drops, on the
//! success path and the error path alike.

pub mod bootstrap;

use duckdb::{params, types::Value, Connection};
use parking_lot::Mutex;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

use crate::error::{Result, ServiceError};
use crate::schema::{quote_ident, Column, ColumnKind};

/// Path value that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Cloneable capability over one shared DuckDB connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Store {
    /// Open (or create) an on-disk database and apply the bootstrap DDL.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ServiceError::Database(format!("create dir: {e}")))?;
        }
        let conn = Connection::open(path)?;
        bootstrap::apply(&conn)?;
        info!(path = %path.display(), "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    /// Open a DuckDB in‐memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        bootstrap::apply(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(IN_MEMORY),
        })
    }

    /// `:memory:` selects [`Store::in_memory`], anything else is a file path.
    pub fn open_location(location: &str) -> Result<Self> {
        if location == IN_MEMORY {
            Self::in_memory()
        } else {
            Self::open(Path::new(location))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the connection outside any explicit transaction.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction: committed when `f` succeeds, rolled back
    /// otherwise, so no partial write is ever visible.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback() {
                    warn!("rollback failed after `{}`: {}", err, rb);
                }
                Err(err)
            }
        }
    }

    /// Row count of `table`.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
            Ok(conn.query_row(&sql, [], |r| r.get(0))?)
        })
    }

    /// Every row of `table` with its column names, in insertion order.
    pub fn select_all(&self, table: &str) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        self.with_conn(|conn| {
            let cols = table_columns(conn, table)?.ok_or_else(|| {
                ServiceError::NotFound(format!("table `{}` does not exist", table))
            })?;
            let names: Vec<String> = cols.into_iter().map(|c| c.name).collect();
            let projection = names
                .iter()
                .map(|n| quote_ident(n))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("SELECT {} FROM {}", projection, quote_ident(table));

            let mut stmt = conn.prepare(&sql)?;
            let width = names.len();
            let rows = stmt
                .query_map([], |row| {
                    (0..width)
                        .map(|i| row.get::<_, Value>(i))
                        .collect::<duckdb::Result<Vec<Value>>>()
                })?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok((names, rows))
        })
    }
}

/// Columns of `table` in declaration order, or `None` when no such relation
/// exists. Table names are matched case-insensitively, as DuckDB resolves them.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Option<Vec<Column>>> {
    let mut stmt = conn.prepare(
        "SELECT column_name, data_type FROM information_schema.columns \
         WHERE table_schema = 'main' AND lower(table_name) = lower(?) \
         ORDER BY ordinal_position",
    )?;
    let cols = stmt
        .query_map(params![table], |row| {
            let name: String = row.get(0)?;
            let data_type: String = row.get(1)?;
            Ok(Column {
                name,
                kind: ColumnKind::from_sql_type(&data_type),
            })
        })?
        .collect::<duckdb::Result<Vec<_>>>()?;

    Ok(if cols.is_empty() { None } else { Some(cols) })
}
