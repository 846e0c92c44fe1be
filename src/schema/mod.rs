pub mod derive;
pub mod sql;
pub mod types;

pub use derive::derive_columns;
pub use sql::{create_keyed_table_sql, create_table_sql, insert_sql, quote_ident};
pub use types::{parse_bool, Column, ColumnKind};
