//! Materialized views: snapshot tables recomputed from a source query only
//! when explicitly asked to.

use duckdb::params;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::duck::Store;
use crate::entity::Task;
use crate::error::{Result, ServiceError};
use crate::schema::quote_ident;

/// Snapshot read by the aggregate endpoints.
pub const TASK_TABLE: &str = "task_table";
/// Plain view computing the join behind [`TASK_TABLE`].
pub const TASK_SOURCE: &str = "task_table_source";

/// A snapshot table and the relation it is recomputed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializedView {
    pub name: &'static str,
    pub source: &'static str,
}

pub const MATERIALIZED_VIEWS: &[MaterializedView] = &[MaterializedView {
    name: TASK_TABLE,
    source: TASK_SOURCE,
}];

pub fn lookup(view: &str) -> Option<&'static MaterializedView> {
    MATERIALIZED_VIEWS.iter().find(|v| v.name == view)
}

#[derive(Clone)]
pub struct ViewRefresher {
    store: Store,
}

impl ViewRefresher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Recompute `view` in place, in one transaction. Blocks until the store
    /// has committed or failed; failures are returned as-is, never retried.
    pub fn refresh(&self, view: &str) -> Result<usize> {
        let def = lookup(view).ok_or_else(|| {
            ServiceError::Database(format!("materialized view `{}` does not exist", view))
        })?;
        let start = Instant::now();
        debug!(view, "refreshing");

        let result = self.store.with_transaction(|conn| {
            conn.execute(&format!("DELETE FROM {}", quote_ident(def.name)), [])?;
            let rows = conn.execute(
                &format!(
                    "INSERT INTO {} SELECT * FROM {}",
                    quote_ident(def.name),
                    quote_ident(def.source)
                ),
                [],
            )?;
            Ok(rows)
        });

        match &result {
            Ok(rows) => info!(view, rows, elapsed = ?start.elapsed(), "refresh committed"),
            Err(e) => error!(view, "refresh failed: {}", e),
        }
        result
    }

    /// Refresh [`TASK_TABLE`], then read it, optionally filtered by taxon.
    /// An empty result is reported as not found.
    pub fn read_tasks(&self, taxon: Option<&str>) -> Result<Vec<Task>> {
        self.refresh(TASK_TABLE)?;

        let tasks = self.store.with_conn(|conn| {
            let mut sql = format!("SELECT {} FROM {}", Task::COLUMNS, quote_ident(TASK_TABLE));
            let tasks = match taxon {
                Some(name) => {
                    sql.push_str(" WHERE taxonname = ?");
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![name], |row| Task::from_row(row))?;
                    rows.collect::<duckdb::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map([], |row| Task::from_row(row))?;
                    rows.collect::<duckdb::Result<Vec<_>>>()?
                }
            };
            Ok(tasks)
        })?;

        if tasks.is_empty() {
            return Err(ServiceError::NotFound("Data not found".into()));
        }
        Ok(tasks)
    }
}
