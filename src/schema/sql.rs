use super::types::Column;

/// Quote an identifier for DuckDB, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_defs(cols: &[Column]) -> String {
    cols.iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.kind.sql_type()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE` statement for `cols`, in order.
pub fn create_table_sql(table: &str, cols: &[Column], if_not_exists: bool) -> String {
    format!(
        "CREATE TABLE {}{} ({});",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_ident(table),
        column_defs(cols)
    )
}

/// Idempotent `CREATE TABLE` with `key` as the primary key.
pub fn create_keyed_table_sql(table: &str, cols: &[Column], key: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}));",
        quote_ident(table),
        column_defs(cols),
        quote_ident(key)
    )
}

/// Parameterised `INSERT` naming each target column explicitly, so columns
/// the payload does not carry fall back to NULL.
pub fn insert_sql(table: &str, columns: &[&str]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names,
        placeholders
    )
}
