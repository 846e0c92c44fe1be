// src/schema/types.rs

use duckdb::types::Value;
use serde::{Deserialize, Serialize};

/// Value kind of a column, as inferred from text or read back from the store.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    /// DuckDB type used when a table is created for this kind.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "BIGINT",
            ColumnKind::Float => "DOUBLE",
            ColumnKind::Boolean => "BOOLEAN",
            ColumnKind::Text => "VARCHAR",
        }
    }

    /// Map a DuckDB `data_type` string back onto a kind.
    ///
    /// - TINYINT, SMALLINT, INTEGER, BIGINT, HUGEINT (+ unsigned) → Integer
    /// - FLOAT, REAL, DOUBLE, DECIMAL*, NUMERIC*                  → Float
    /// - BOOLEAN, BOOL                                            → Boolean
    /// - fallback (VARCHAR, DATE, TIMESTAMP, ...)                 → Text
    pub fn from_sql_type(data_type: &str) -> Self {
        let upper = data_type.trim().to_ascii_uppercase();
        match upper.as_str() {
            "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" | "HUGEINT" | "UTINYINT"
            | "USMALLINT" | "UINTEGER" | "UBIGINT" => ColumnKind::Integer,
            "FLOAT" | "REAL" | "DOUBLE" => ColumnKind::Float,
            "BOOLEAN" | "BOOL" => ColumnKind::Boolean,
            _ if upper.starts_with("DECIMAL") || upper.starts_with("NUMERIC") => ColumnKind::Float,
            // DuckDB casts text into anything else (DATE, TIMESTAMP, ...) on insert.
            _ => ColumnKind::Text,
        }
    }

    /// Smallest kind able to hold values of both `self` and `other`.
    pub fn widen(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }

    /// Encode one raw cell for binding. `None` cells bind as NULL; `None` is
    /// returned when the text does not fit the kind.
    pub fn bind(self, raw: Option<&str>) -> Option<Value> {
        let Some(raw) = raw else {
            return Some(Value::Null);
        };
        match self {
            ColumnKind::Integer => parse_integer(raw).map(Value::BigInt),
            ColumnKind::Float => raw.trim().parse::<f64>().ok().map(Value::Double),
            ColumnKind::Boolean => parse_bool(raw).map(Value::Boolean),
            ColumnKind::Text => Some(Value::Text(raw.to_string())),
        }
    }
}

/// Integer text, also accepting the `3.0` form written for integer columns
/// that hold missing values.
fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    // 2^63; the upper bound itself does not fit.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    let f = raw.parse::<f64>().ok()?;
    if f.fract() == 0.0 && (-BOUND..BOUND).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// Boolean spellings recognised in tabular text.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// A single column definition: name plus value kind.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_numeric_and_text() {
        assert_eq!(ColumnKind::Integer.widen(ColumnKind::Float), ColumnKind::Float);
        assert_eq!(ColumnKind::Boolean.widen(ColumnKind::Integer), ColumnKind::Text);
        assert_eq!(ColumnKind::Text.widen(ColumnKind::Text), ColumnKind::Text);
    }

    #[test]
    fn sql_type_maps_back_to_kind() {
        for kind in [
            ColumnKind::Integer,
            ColumnKind::Float,
            ColumnKind::Boolean,
            ColumnKind::Text,
        ] {
            assert_eq!(ColumnKind::from_sql_type(kind.sql_type()), kind);
        }
        assert_eq!(ColumnKind::from_sql_type("DECIMAL(18,3)"), ColumnKind::Float);
        assert_eq!(ColumnKind::from_sql_type("TIMESTAMP"), ColumnKind::Text);
    }

    #[test]
    fn bind_respects_kind() {
        assert_eq!(ColumnKind::Integer.bind(Some(" 42 ")), Some(Value::BigInt(42)));
        assert_eq!(ColumnKind::Integer.bind(Some("4.2")), None);
        assert_eq!(ColumnKind::Integer.bind(Some("3.0")), Some(Value::BigInt(3)));
        assert_eq!(ColumnKind::Integer.bind(Some("-7.0")), Some(Value::BigInt(-7)));
        assert_eq!(ColumnKind::Integer.bind(Some("1e300")), None);
        assert_eq!(ColumnKind::Integer.bind(Some("inf")), None);
        assert_eq!(ColumnKind::Float.bind(Some("4.5")), Some(Value::Double(4.5)));
        assert_eq!(ColumnKind::Boolean.bind(Some("False")), Some(Value::Boolean(false)));
        assert_eq!(
            ColumnKind::Text.bind(Some(" kept as is ")),
            Some(Value::Text(" kept as is ".into()))
        );
        assert_eq!(ColumnKind::Integer.bind(None), Some(Value::Null));
    }
}
