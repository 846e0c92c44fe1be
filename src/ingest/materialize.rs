use duckdb::{params_from_iter, types::Value, Connection};
use std::{path::Path, time::Instant};
use tracing::{error, info, warn};

use super::normalize::normalize;
use super::payload::TabularPayload;
use crate::duck::{table_columns, Store};
use crate::error::{Result, ServiceError};
use crate::schema::{create_table_sql, derive_columns, insert_sql, Column};

/// An uploaded file: its client-supplied name and raw contents.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Input refused before any parsing or store access. Reported to the caller
/// as an informational message, not as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotCsv { filename: String },
    EmptyTableName,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NotCsv { .. } => "file must be in CSV format",
            Rejection::EmptyTableName => "table name required",
        }
    }
}

/// Rows appended to `table`; `created` is set when this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub table: String,
    pub rows: usize,
    pub created: bool,
}

impl Materialized {
    pub fn message(&self) -> String {
        format!("{} updated", self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Materialized(Materialized),
    Rejected(Rejection),
}

/// Appends tabular payloads into named tables, creating a table the first
/// time its name is seen.
#[derive(Clone)]
pub struct TableMaterializer {
    store: Store,
}

impl TableMaterializer {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Ingest an uploaded `.csv` file into the table named after its stem.
    pub fn ingest_from_upload(&self, upload: &Upload) -> Result<IngestOutcome> {
        let Some(table) = csv_table_name(&upload.filename) else {
            warn!(filename = %upload.filename, "upload rejected: not a csv file");
            return Ok(IngestOutcome::Rejected(Rejection::NotCsv {
                filename: upload.filename.clone(),
            }));
        };

        let payload = TabularPayload::from_bytes(&upload.bytes)?;
        self.materialize(&table, payload)
            .map(IngestOutcome::Materialized)
    }

    /// Ingest raw CSV text into `table_name`.
    pub fn ingest_from_text(&self, table_name: &str, raw: &str) -> Result<IngestOutcome> {
        let table = table_name.trim();
        if table.is_empty() {
            warn!("text ingestion rejected: empty table name");
            return Ok(IngestOutcome::Rejected(Rejection::EmptyTableName));
        }

        let payload = TabularPayload::parse(raw)?;
        self.materialize(table, payload)
            .map(IngestOutcome::Materialized)
    }

    /// Normalize, infer and append `payload` into `table` as one transaction.
    pub fn materialize(&self, table: &str, mut payload: TabularPayload) -> Result<Materialized> {
        let start = Instant::now();
        normalize(&mut payload)?;
        let inferred = derive_columns(table, payload.columns(), payload.rows())?;

        let result = self
            .store
            .with_transaction(|conn| append(conn, table, &payload, &inferred));

        match &result {
            Ok(done) => info!(
                table = %done.table,
                rows = done.rows,
                created = done.created,
                elapsed = ?start.elapsed(),
                "payload materialized"
            ),
            Err(e) => error!(table = %table, "materialize failed: {}", e),
        }
        result
    }
}

/// Table name for an uploaded file: its stem, if it carries a `.csv` extension.
pub fn csv_table_name(filename: &str) -> Option<String> {
    let path = Path::new(filename);
    let is_csv = path
        .extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn append(
    conn: &Connection,
    table: &str,
    payload: &TabularPayload,
    inferred: &[Column],
) -> Result<Materialized> {
    let (targets, created) = match table_columns(conn, table)? {
        None => {
            conn.execute_batch(&create_table_sql(table, inferred, false))?;
            (inferred.to_vec(), true)
        }
        Some(existing) => (match_existing(table, payload.columns(), &existing)?, false),
    };

    if !payload.is_empty() {
        let names: Vec<&str> = targets.iter().map(|c| c.name.as_str()).collect();
        let mut stmt = conn.prepare(&insert_sql(table, &names))?;

        for (row_idx, row) in payload.rows().iter().enumerate() {
            let values = row
                .iter()
                .zip(&targets)
                .map(|(cell, col)| {
                    col.kind.bind(cell.as_deref()).ok_or_else(|| {
                        ServiceError::Database(format!(
                            "row {}: value {:?} does not fit column `{}` of type {}",
                            row_idx + 1,
                            cell.as_deref().unwrap_or_default(),
                            col.name,
                            col.kind.sql_type()
                        ))
                    })
                })
                .collect::<Result<Vec<Value>>>()?;
            stmt.execute(params_from_iter(values))?;
        }
    }

    Ok(Materialized {
        table: table.to_string(),
        rows: payload.len(),
        created,
    })
}

/// Resolve each payload column against the existing table's columns by
/// case-insensitive name. Columns the table lacks reject the whole payload;
/// table columns the payload lacks are left NULL.
fn match_existing(table: &str, payload_cols: &[String], existing: &[Column]) -> Result<Vec<Column>> {
    let mut targets = Vec::with_capacity(payload_cols.len());
    let mut unknown = Vec::new();

    for name in payload_cols {
        match existing.iter().find(|c| c.name.eq_ignore_ascii_case(name)) {
            Some(col) => targets.push(col.clone()),
            None => unknown.push(format!("`{}`", name)),
        }
    }

    if !unknown.is_empty() {
        return Err(ServiceError::Database(format!(
            "table `{}` has no column(s) {}",
            table,
            unknown.join(", ")
        )));
    }
    Ok(targets)
}
