use csv::ReaderBuilder;
use std::collections::HashSet;

use crate::error::{Result, ServiceError};

/// Cell spellings read as missing values; stored as NULL.
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
    "#NA",
];

/// Parsed delimited text: ordered column names and ordered rows, each row
/// holding exactly one cell per column. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularPayload {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl TabularPayload {
    /// Parse CSV text with a header row. Rows whose field count differs from
    /// the header fail the whole parse; nothing is dropped silently.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let header = rdr.headers()?.clone();
        if header.is_empty() {
            return Err(ServiceError::Parse("payload has no header row".into()));
        }
        let columns = header_names(header.iter());
        let width = columns.len();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result?;
            if record.len() != width {
                return Err(ServiceError::Parse(format!(
                    "row {} has {} fields, header has {}",
                    line + 1,
                    record.len(),
                    width
                )));
            }
            rows.push(record.iter().map(cell).collect());
        }

        Ok(Self { columns, rows })
    }

    /// Decode uploaded bytes as UTF-8, then [`TabularPayload::parse`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ServiceError::Parse(format!("payload is not valid UTF-8: {e}")))?;
        Self::parse(text)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [String] {
        &mut self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn cell(raw: &str) -> Option<String> {
    if MISSING_TOKENS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Header cells as column names: an empty cell at position `i` becomes
/// `Unnamed: i`, and repeated names get `.1`, `.2`, ... suffixes.
fn header_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::new();

    for (i, name) in raw.enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {i}")
        } else {
            name.to_string()
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(candidate.clone());
        names.push(candidate);
    }

    names
}
