//! Fixed-schema research records and their get/update/delete operations.

pub mod models;

use duckdb::{params, Row, ToSql};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

pub use models::{Additives, Microorganisms, People, Task};

use crate::duck::Store;
use crate::error::{Result, ServiceError};
use crate::schema::{quote_ident, ColumnKind};

/// One column of an entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// A row type stored in its own table under a numeric primary key.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    const TABLE: &'static str;
    const KEY: &'static str;
    /// Human-readable singular, used in not-found messages.
    const LABEL: &'static str;
    /// Columns in table order; the struct fields follow the same order.
    const COLUMNS: &'static [FieldDef];

    fn key(&self) -> i64;
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self>;
    /// Bind parameters in [`Entity::COLUMNS`] order.
    fn params(&self) -> Vec<&dyn ToSql>;
}

fn projection<E: Entity>() -> String {
    E::COLUMNS
        .iter()
        .map(|f| quote_ident(f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn not_found<E: Entity>() -> ServiceError {
    ServiceError::NotFound(format!("{} not found", E::LABEL))
}

/// Fetch the record whose key equals `id`.
pub fn get<E: Entity>(store: &Store, id: i64) -> Result<E> {
    store.with_conn(|conn| {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? LIMIT 1",
            projection::<E>(),
            quote_ident(E::TABLE),
            quote_ident(E::KEY)
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], |row| E::from_row(row))?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Err(not_found::<E>()),
        }
    })
}

/// Overwrite every non-key column of the record keyed by `record.key()`.
pub fn update<E: Entity>(store: &Store, record: &E) -> Result<()> {
    let assignments = E::COLUMNS
        .iter()
        .filter(|f| f.name != E::KEY)
        .map(|f| format!("{} = ?", quote_ident(f.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(E::TABLE),
        assignments,
        quote_ident(E::KEY)
    );
    let key = record.key();

    store.with_transaction(|conn| {
        let mut params: Vec<&dyn ToSql> = E::COLUMNS
            .iter()
            .zip(record.params())
            .filter(|(f, _)| f.name != E::KEY)
            .map(|(_, p)| p)
            .collect();
        params.push(&key);
        let changed = conn.execute(&sql, params.as_slice())?;
        debug!(table = E::TABLE, key, changed, "update");
        if changed == 0 {
            return Err(not_found::<E>());
        }
        Ok(())
    })?;

    info!(table = E::TABLE, key, "record updated");
    Ok(())
}

/// Delete the record keyed by `id`.
pub fn delete<E: Entity>(store: &Store, id: i64) -> Result<()> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(E::TABLE),
        quote_ident(E::KEY)
    );
    store.with_transaction(|conn| {
        if conn.execute(&sql, params![id])? == 0 {
            return Err(not_found::<E>());
        }
        Ok(())
    })?;

    info!(table = E::TABLE, key = id, "record deleted");
    Ok(())
}
