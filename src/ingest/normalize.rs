//! Column-name normalization applied to every ingested payload.
//!
//! Two passes, always in this order: the row-index artifact is renamed, then
//! every name is lowercased.

use std::collections::HashSet;

use super::payload::TabularPayload;
use crate::error::{Result, ServiceError};

/// Header written for an unnamed row-index column.
pub const INDEX_ARTIFACT: &str = "Unnamed: 0";
/// Name the index artifact is stored under.
pub const INDEX_REPLACEMENT: &str = "blank";

/// Rename the index artifact column, if present. Returns whether it was.
/// Matching ignores case, so running this after [`lowercase_columns`] gives
/// the same names.
pub fn rename_index_artifact(columns: &mut [String]) -> bool {
    match columns
        .iter_mut()
        .find(|c| c.eq_ignore_ascii_case(INDEX_ARTIFACT))
    {
        Some(col) => {
            *col = INDEX_REPLACEMENT.to_string();
            true
        }
        None => false,
    }
}

pub fn lowercase_columns(columns: &mut [String]) {
    for col in columns.iter_mut() {
        *col = col.to_lowercase();
    }
}

/// Apply both passes. Names that only collide once normalized are rejected.
pub fn normalize(payload: &mut TabularPayload) -> Result<()> {
    let columns = payload.columns_mut();
    rename_index_artifact(columns);
    lowercase_columns(columns);

    let mut seen = HashSet::new();
    for col in payload.columns() {
        if !seen.insert(col.as_str()) {
            return Err(ServiceError::Parse(format!(
                "column `{}` appears more than once after normalization",
                col
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn renames_only_the_index_artifact() {
        let mut cols = names(&["UNNAMED: 0", "Unnamed: 3", "Unnamed: 01"]);
        assert!(rename_index_artifact(&mut cols));
        assert_eq!(cols, names(&["blank", "Unnamed: 3", "Unnamed: 01"]));

        let mut untouched = names(&["id"]);
        assert!(!rename_index_artifact(&mut untouched));
    }

    #[test]
    fn lowercases_every_name() {
        let mut cols = names(&["ID_Article", "DOI", "TaxonName"]);
        lowercase_columns(&mut cols);
        assert_eq!(cols, names(&["id_article", "doi", "taxonname"]));
    }

    #[test]
    fn pass_order_does_not_change_the_result() {
        let mut renamed_first = names(&["Unnamed: 0", "Name"]);
        rename_index_artifact(&mut renamed_first);
        lowercase_columns(&mut renamed_first);
        assert_eq!(renamed_first, names(&["blank", "name"]));

        let mut lowered_first = names(&["Unnamed: 0", "Name"]);
        lowercase_columns(&mut lowered_first);
        assert!(rename_index_artifact(&mut lowered_first));
        assert_eq!(lowered_first, renamed_first);
    }

    #[test]
    fn normalize_applies_both_passes() {
        let mut p = TabularPayload::parse(",ID,Name\n0,1,Alice").unwrap();
        normalize(&mut p).unwrap();
        assert_eq!(p.columns(), names(&["blank", "id", "name"]).as_slice());
    }

    #[test]
    fn case_only_duplicates_are_rejected() {
        let mut p = TabularPayload::parse("Id,id\n1,2").unwrap();
        let err = normalize(&mut p).unwrap_err();
        assert_eq!(err.category(), "ParseError");
    }
}
