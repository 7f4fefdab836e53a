use thiserror::Error;

use crate::types::ColumnKind;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query execution error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Incompatible column types: '{column_a}' is {kind_a}, '{column_b}' is {kind_b}"
    )]
    IncompatibleColumnTypes {
        column_a: String,
        kind_a: ColumnKind,
        column_b: String,
        kind_b: ColumnKind,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
