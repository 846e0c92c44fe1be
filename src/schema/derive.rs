use tracing::debug;

use super::types::{parse_bool, Column, ColumnKind};
use crate::error::{Result, ServiceError};

/// For each column, look at every row:
///  - Ignore missing cells (`None`)
///  - Infer the kind of each present cell and widen the running kind
///  - Stop scanning a column once it has widened to text
///  - A column with no present cells defaults to text
pub fn derive_columns(
    table_name: &str,
    header_names: &[String],
    rows: &[Vec<Option<String>>],
) -> Result<Vec<Column>> {
    if header_names.is_empty() {
        return Err(ServiceError::Parse(format!(
            "derive_columns: `{}` has no headers",
            table_name
        )));
    }

    let mut cols = Vec::with_capacity(header_names.len());

    for (idx, col_name) in header_names.iter().enumerate() {
        let mut kind: Option<ColumnKind> = None;

        for row in rows {
            let Some(cell) = row.get(idx).and_then(|c| c.as_deref()) else {
                continue;
            };
            let inferred = infer_kind(cell);
            let widened = kind.map_or(inferred, |k| k.widen(inferred));
            if widened == ColumnKind::Text {
                debug!(
                    "derive_columns: column `{}` in `{}` falls back to text at {:?}",
                    col_name, table_name, cell
                );
                kind = Some(ColumnKind::Text);
                break;
            }
            kind = Some(widened);
        }

        let kind = kind.unwrap_or_else(|| {
            debug!(
                "derive_columns: no values for `{}` in `{}`, defaulting to text",
                col_name, table_name
            );
            ColumnKind::Text
        });

        cols.push(Column::new(col_name.clone(), kind));
    }

    Ok(cols)
}

/// Kind of a single present cell.
pub fn infer_kind(raw: &str) -> ColumnKind {
    let v = raw.trim();
    if v.parse::<i64>().is_ok() {
        ColumnKind::Integer
    } else if v.parse::<f64>().is_ok() {
        ColumnKind::Float
    } else if parse_bool(v).is_some() {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    }
}
