use serde::Serialize;

/// Failures surfaced by the store, the materializer and the view refresher.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Any store-level failure: create, append, update, delete, refresh or read.
    #[error("{0}")]
    Database(String),

    /// Delimited text that cannot be turned into a tabular payload.
    #[error("{0}")]
    Parse(String),

    /// The addressed record or result set does not exist.
    #[error("{0}")]
    NotFound(String),
}

impl ServiceError {
    /// Category string reported as `error_type` in the structured error body.
    pub fn category(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "DatabaseError",
            ServiceError::Parse(_) => "ParseError",
            ServiceError::NotFound(_) => "NotFound",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error_type: self.category().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<duckdb::Error> for ServiceError {
    fn from(e: duckdb::Error) -> Self {
        ServiceError::Database(e.to_string())
    }
}

impl From<csv::Error> for ServiceError {
    fn from(e: csv::Error) -> Self {
        ServiceError::Parse(e.to_string())
    }
}

/// Structured error body: `{error_type, message}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error_type: String,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
