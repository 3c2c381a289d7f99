use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table not found: {0}")]
    NotFound(String),

    #[error("The {table} table does not have a {column} column")]
    Schema { table: String, column: String },

    #[error("Invalid cutoff instant: {0}")]
    InvalidCutoff(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown patient: {0}")]
    UnknownPatient(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl ViewerError {
    pub fn schema(table: &str, column: &str) -> Self {
        ViewerError::Schema {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Schema errors are scoped to one category; everything else fails the request.
    pub fn is_schema(&self) -> bool {
        matches!(self, ViewerError::Schema { .. })
    }
}

pub type ViewResult<T> = Result<T, ViewerError>;
